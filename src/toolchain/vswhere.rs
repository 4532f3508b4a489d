//! Querying installed Visual Studio instances with vswhere.
//!
//! vswhere is fetched on demand into the repository's `.tools` directory
//! from a single fixed URL; unlike the SDK installer there is no mirror to
//! fall back to. Its JSON output lists instances sorted by preference, so
//! callers take the first record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::config::BuildConfig;
use crate::core::manifest::VsRequirement;
use crate::util::download::download_to;
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessBuilder;

pub const DEFAULT_VSWHERE_VERSION: &str = "2.5.2";

const VSWHERE_URL_BASE: &str =
    "https://netcorenativeassets.blob.core.windows.net/resource-packages/external/windows/vswhere";

/// Component id every qualifying instance must carry.
const MSBUILD_COMPONENT: &str = "Microsoft.Component.MSBuild";

/// One installed Visual Studio instance as reported by vswhere.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsInstance {
    pub installation_path: PathBuf,
    pub installation_version: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Enumerates installed instances matching a requirement.
///
/// A seam so locator logic can assert which queries ran (or that none did)
/// without spawning the real tool.
pub trait InstanceQuery {
    fn query(
        &mut self,
        requirement: &VsRequirement,
        exclude_prerelease: bool,
    ) -> Result<Vec<VsInstance>>;
}

/// The real vswhere tool, downloaded on first use.
pub struct Vswhere {
    tools_dir: PathBuf,
    version: String,
}

impl Vswhere {
    /// Configure from the repository: version pinned by the manifest or the
    /// default, cached under `<repo>/.tools/vswhere/<version>/`.
    pub fn from_config(config: &BuildConfig) -> Self {
        Vswhere {
            tools_dir: config.tools_dir.clone(),
            version: config
                .global_json
                .tools
                .vswhere
                .clone()
                .unwrap_or_else(|| DEFAULT_VSWHERE_VERSION.to_string()),
        }
    }

    fn ensure_tool(&self) -> Result<PathBuf> {
        let dir = self.tools_dir.join("vswhere").join(&self.version);
        let exe = dir.join("vswhere.exe");

        if !exe.exists() {
            ensure_dir(&dir)?;
            let url = format!("{}/{}/vswhere.exe", VSWHERE_URL_BASE, self.version);
            download_to(&url, &exe)?;
        }

        Ok(exe)
    }
}

impl InstanceQuery for Vswhere {
    fn query(
        &mut self,
        requirement: &VsRequirement,
        exclude_prerelease: bool,
    ) -> Result<Vec<VsInstance>> {
        let exe = self.ensure_tool()?;

        let output = ProcessBuilder::new(&exe)
            .args(query_args(requirement, exclude_prerelease))
            .exec()?;
        if !output.status.success() {
            tracing::debug!(
                "vswhere failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(Vec::new());
        }

        serde_json::from_slice(&output.stdout).context("failed to parse vswhere output")
    }
}

/// The vswhere argument list for a requirement: latest qualifying instance,
/// JSON output, MSBuild component mandatory, prereleases included unless
/// explicitly excluded.
pub fn query_args(requirement: &VsRequirement, exclude_prerelease: bool) -> Vec<String> {
    let mut args: Vec<String> = [
        "-latest",
        "-format",
        "json",
        "-requires",
        MSBUILD_COMPONENT,
        "-products",
        "*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if !exclude_prerelease {
        args.push("-prerelease".to_string());
    }

    args.push("-version".to_string());
    args.push(requirement.version.clone());

    for component in &requirement.components {
        args.push("-requires".to_string());
        args.push(component.clone());
    }

    args
}
