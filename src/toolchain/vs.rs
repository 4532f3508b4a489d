//! Locating Visual Studio's native MSBuild on Windows hosts.
//!
//! The preference order is strict:
//!
//!   1. MSBuild from an active Developer Command Prompt. Accepted when its
//!      version meets the minimum; rejected outright (no fallback) when it
//!      does not, since an explicitly activated incompatible shell reflects
//!      operator intent that must be surfaced.
//!   2. MSBuild from a compatible installed instance located via vswhere.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::config::BuildConfig;
use crate::core::errors::BootstrapError;
use crate::core::manifest::VsRequirement;
use crate::core::version::EngineVersion;
use crate::toolchain::vswhere::{InstanceQuery, Vswhere};
use crate::toolchain::{BuildTool, DotnetCli, EngineKind, EngineLocator};
use crate::util::process::ProcessBuilder;

/// Minimum Visual Studio version required when the manifest pins none.
pub const MINIMUM_VS_VERSION: &str = "17.7";

/// MSBuild made visible by an active Developer Command Prompt.
#[derive(Debug, Clone)]
pub struct ActiveShell {
    pub msbuild: PathBuf,
    pub version: EngineVersion,
    /// The shell's advertised VS version, for diagnostics.
    pub shell_version: Option<String>,
}

impl ActiveShell {
    /// Probe the environment for an active developer shell.
    ///
    /// `Ok(None)` when no shell marker is present or the shell exposes no
    /// msbuild on PATH; an error only when the engine is found but its
    /// version cannot be read.
    pub fn probe() -> Result<Option<ActiveShell>> {
        if env::var_os("VSINSTALLDIR").is_none() {
            return Ok(None);
        }
        let Some(msbuild) = crate::util::process::find_executable("msbuild.exe") else {
            return Ok(None);
        };

        let version = probe_engine_version(&msbuild)?;
        Ok(Some(ActiveShell {
            msbuild,
            version,
            shell_version: env::var("VisualStudioVersion").ok(),
        }))
    }
}

/// Read an engine's four-part version by running `-version -nologo` and
/// parsing the last output line (e.g. `17.8.3.51904`, optionally carrying a
/// `+sourcehash` suffix).
pub fn probe_engine_version(msbuild: &Path) -> Result<EngineVersion> {
    let output = ProcessBuilder::new(msbuild)
        .args(["-version", "-nologo"])
        .exec_and_check()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .with_context(|| format!("`{}` printed no version", msbuild.display()))?;
    let version = line.split('+').next().unwrap_or(line);

    Ok(version.parse()?)
}

/// Resolve the full path to `msbuild.exe` for a requirement.
///
/// Pure over its inputs apart from the environment writes performed when an
/// installed instance is selected.
pub fn resolve_msbuild(
    requirement: &VsRequirement,
    shell: Option<ActiveShell>,
    query: &mut dyn InstanceQuery,
    exclude_prerelease: bool,
) -> Result<PathBuf> {
    let minimum: EngineVersion = requirement.version.parse()?;

    if let Some(shell) = shell {
        if shell.version >= minimum {
            return Ok(shell.msbuild);
        }

        let found = shell
            .shell_version
            .unwrap_or_else(|| shell.version.to_string());
        return Err(BootstrapError::IncompatibleEnvironment {
            found,
            required: requirement.version.clone(),
        }
        .into());
    }

    let instances = query.query(requirement, exclude_prerelease)?;
    // vswhere returns instances sorted by preference; take the first.
    let instance = instances
        .into_iter()
        .next()
        .ok_or(BootstrapError::NoCompatibleInstance)?;

    let major: u32 = instance
        .installation_version
        .split('.')
        .next()
        .and_then(|part| part.parse().ok())
        .with_context(|| {
            format!(
                "unexpected installation version `{}`",
                instance.installation_version
            )
        })?;

    set_instance_env_vars(&instance.installation_path, major);

    Ok(msbuild_path(
        &instance.installation_path,
        major,
        requirement.prefer_64bit,
    ))
}

/// Environment markers later build steps depend on (project-system targets
/// and extension builds read these).
fn set_instance_env_vars(install_dir: &Path, major: u32) {
    env::set_var("VSINSTALLDIR", install_dir);
    env::set_var(
        format!("VS{}0COMNTOOLS", major),
        install_dir.join("Common7").join("Tools"),
    );

    let sdk_dir = install_dir.join("VSSDK");
    if sdk_dir.exists() {
        env::set_var(format!("VSSDK{}0Install", major), &sdk_dir);
        env::set_var("VSSDKInstall", &sdk_dir);
    }
}

/// Derive the engine binary path inside an installation.
///
/// Versions before 16 keep MSBuild under a numbered directory; 16.0 and
/// newer use the fixed `Current` marker. The `amd64` subdirectory is used
/// when the requirement prefers 64-bit and the instance ships one.
pub fn msbuild_path(install_dir: &Path, major: u32, prefer_64bit: bool) -> PathBuf {
    let version_dir = if major < 16 {
        format!("{}.0", major)
    } else {
        "Current".to_string()
    };

    let bin = install_dir.join("MSBuild").join(version_dir).join("Bin");
    let amd64 = bin.join("amd64");
    if prefer_64bit && amd64.exists() {
        amd64.join("msbuild.exe")
    } else {
        bin.join("msbuild.exe")
    }
}

/// Windows engine locator: chooses between the dotnet-hosted and the native
/// engine, then resolves the chosen one.
pub struct WindowsLocator {
    /// Memoized engine choice; computed once per process.
    engine: Option<EngineKind>,
}

impl WindowsLocator {
    pub fn new() -> Self {
        WindowsLocator { engine: None }
    }

    /// The command-line override wins; otherwise the manifest decides
    /// (`tools.vs` selects the native engine, `tools.dotnet` the hosted
    /// one).
    fn default_engine(config: &BuildConfig) -> Result<EngineKind> {
        if let Some(kind) = config.msbuild_engine {
            return Ok(kind);
        }

        let tools = &config.global_json.tools;
        if tools.vs.is_some() {
            Ok(EngineKind::VisualStudio)
        } else if tools.dotnet.is_some() {
            Ok(EngineKind::Dotnet)
        } else {
            bail!(
                "--msbuild-engine must be specified, or global.json must specify \
                 'tools.dotnet' or 'tools.vs'"
            );
        }
    }
}

impl Default for WindowsLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLocator for WindowsLocator {
    fn locate(&mut self, config: &BuildConfig, dotnet: &mut DotnetCli) -> Result<BuildTool> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                let engine = Self::default_engine(config)?;
                self.engine = Some(engine);
                engine
            }
        };

        // Initialize the dotnet CLI whenever the manifest lists it, even
        // for VS-hosted builds: restore steps still shell out to it.
        let mut dotnet_root = None;
        if config.global_json.tools.dotnet.is_some() {
            dotnet_root = Some(dotnet.initialize(config, config.restore)?);
        }

        match engine {
            EngineKind::Dotnet => {
                let root =
                    dotnet_root.context("global.json must specify 'tools.dotnet'")?;
                Ok(BuildTool {
                    path: root.join("dotnet.exe"),
                    command: Some("msbuild".to_string()),
                    kind: EngineKind::Dotnet,
                    exclude_prerelease: config.exclude_prerelease_vs,
                })
            }
            EngineKind::VisualStudio => {
                let requirement = config
                    .global_json
                    .tools
                    .vs_requirement()
                    .unwrap_or_else(|| VsRequirement::minimum(MINIMUM_VS_VERSION));

                let mut vswhere = Vswhere::from_config(config);
                let msbuild = resolve_msbuild(
                    &requirement,
                    ActiveShell::probe()?,
                    &mut vswhere,
                    config.exclude_prerelease_vs,
                )?;

                Ok(BuildTool {
                    path: msbuild,
                    command: None,
                    kind: EngineKind::VisualStudio,
                    exclude_prerelease: config.exclude_prerelease_vs,
                })
            }
        }
    }
}
