//! Build-engine resolution and process-wide caching.
//!
//! Engine discovery is platform-dependent: POSIX hosts always run MSBuild
//! through the .NET CLI, while Windows hosts choose between the dotnet-
//! hosted engine and Visual Studio's native `msbuild.exe`. The two paths
//! are separate [`EngineLocator`] implementations, selected once at
//! startup by [`host_locator`] rather than branched on throughout.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;

use crate::core::config::BuildConfig;

pub mod dotnet;
pub mod install;
pub mod vs;
pub mod vswhere;

pub use dotnet::{DotnetCli, DotnetLocator};
pub use install::{DotnetInstaller, RuntimeKind};
pub use vs::WindowsLocator;

/// Which host flavor of MSBuild runs the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// MSBuild hosted by the cross-platform .NET CLI (`dotnet msbuild`).
    Dotnet,
    /// Visual Studio's native `msbuild.exe` (Windows only).
    VisualStudio,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Dotnet => "dotnet",
            EngineKind::VisualStudio => "vs",
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dotnet" => Ok(EngineKind::Dotnet),
            "vs" => Ok(EngineKind::VisualStudio),
            _ => Err(format!(
                "unexpected msbuild engine '{}'; expected 'vs' or 'dotnet'",
                s
            )),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A runnable build engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTool {
    /// Executable to launch.
    pub path: PathBuf,
    /// Invocation verb inserted before the engine arguments
    /// (`Some("msbuild")` for the dotnet CLI, `None` for `msbuild.exe`).
    pub command: Option<String>,
    pub kind: EngineKind,
    /// The prerelease-exclusion requirement this handle was resolved
    /// under; the resolver's cache invalidation key.
    pub exclude_prerelease: bool,
}

/// Discovers an adequate build engine for one host flavor.
pub trait EngineLocator {
    fn locate(&mut self, config: &BuildConfig, dotnet: &mut DotnetCli) -> Result<BuildTool>;
}

/// Pick the locator for the current host. Called once at startup.
pub fn host_locator() -> Box<dyn EngineLocator> {
    if cfg!(target_os = "windows") {
        Box::new(WindowsLocator::new())
    } else {
        Box::new(DotnetLocator)
    }
}

/// Long-lived owner of toolchain resolution state.
///
/// Resolution is expensive (subprocesses, possibly downloads), so the
/// resolved handle is memoized for the life of the process. The only
/// invalidation trigger is a change to the exclude-prerelease requirement;
/// everything else in the configuration is immutable after startup.
pub struct ToolResolver {
    locator: Box<dyn EngineLocator>,
    dotnet: DotnetCli,
    tool: Option<BuildTool>,
}

impl ToolResolver {
    /// A resolver for the current host platform.
    pub fn for_host() -> Self {
        Self::with_locator(host_locator())
    }

    /// A resolver over an explicit locator.
    pub fn with_locator(locator: Box<dyn EngineLocator>) -> Self {
        ToolResolver {
            locator,
            dotnet: DotnetCli::new(),
            tool: None,
        }
    }

    /// Resolve the build tool, reusing the cached handle unless the
    /// exclude-prerelease requirement changed since it was resolved.
    pub fn build_tool(&mut self, config: &BuildConfig) -> Result<BuildTool> {
        if let Some(tool) = &self.tool {
            if tool.exclude_prerelease == config.exclude_prerelease_vs {
                return Ok(tool.clone());
            }
            self.tool = None;
        }

        let tool = self.locator.locate(config, &mut self.dotnet)?;
        self.tool = Some(tool.clone());
        Ok(tool)
    }
}
