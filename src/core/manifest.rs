//! global.json manifest parsing.
//!
//! The manifest is committed at the repository root and pins the tool
//! versions the bootstrapper must provide before the engine can run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Parsed `global.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalJson {
    #[serde(default)]
    pub tools: Tools,
}

impl GlobalJson {
    /// Load and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))?;
        Ok(manifest)
    }
}

/// The `tools` version map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tools {
    /// .NET SDK version required by the repository.
    pub dotnet: Option<String>,

    /// Additional runtimes to install alongside the SDK, keyed by runtime
    /// kind (`dotnet`, `aspnetcore`, `windowsdesktop`).
    #[serde(default)]
    pub runtimes: BTreeMap<String, Vec<String>>,

    /// Visual Studio requirement. Presence selects the native engine on
    /// Windows unless overridden on the command line.
    pub vs: Option<VsSpec>,

    /// Version of the vswhere instance-locator tool to download.
    pub vswhere: Option<String>,

    /// Version of the on-line dotnet-install script set to fetch.
    pub dotnet_install_script_version: Option<String>,
}

impl Tools {
    /// The Visual Studio requirement in normalized form, if one is pinned.
    pub fn vs_requirement(&self) -> Option<VsRequirement> {
        self.vs.as_ref().map(VsSpec::requirement)
    }
}

/// `tools.vs` accepts either a bare minimum version string or a detailed
/// requirement object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VsSpec {
    Version(String),
    Requirement(VsRequirement),
}

impl VsSpec {
    fn requirement(&self) -> VsRequirement {
        match self {
            VsSpec::Version(version) => VsRequirement::minimum(version),
            VsSpec::Requirement(req) => req.clone(),
        }
    }
}

/// Minimum Visual Studio version plus the workload components an instance
/// must carry to qualify.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VsRequirement {
    /// Two-or-more-part minimum version, e.g. `"17.7"`.
    pub version: String,

    /// Workload component ids that must be installed in the instance.
    #[serde(default)]
    pub components: Vec<String>,

    /// Prefer the 64-bit MSBuild when the instance ships one.
    #[serde(default, rename = "prefer64bit", alias = "prefer_64bit")]
    pub prefer_64bit: bool,
}

impl VsRequirement {
    /// A requirement carrying only a minimum version.
    pub fn minimum(version: &str) -> Self {
        VsRequirement {
            version: version.to_string(),
            components: Vec::new(),
            prefer_64bit: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotnet_only() {
        let manifest: GlobalJson =
            serde_json::from_str(r#"{ "tools": { "dotnet": "8.0.100" } }"#).unwrap();
        assert_eq!(manifest.tools.dotnet.as_deref(), Some("8.0.100"));
        assert!(manifest.tools.vs.is_none());
        assert!(manifest.tools.runtimes.is_empty());
    }

    #[test]
    fn test_parse_vs_as_string() {
        let manifest: GlobalJson =
            serde_json::from_str(r#"{ "tools": { "vs": "17.7" } }"#).unwrap();
        let req = manifest.tools.vs_requirement().unwrap();
        assert_eq!(req, VsRequirement::minimum("17.7"));
    }

    #[test]
    fn test_parse_vs_as_object() {
        let manifest: GlobalJson = serde_json::from_str(
            r#"{
                "tools": {
                    "vs": {
                        "version": "16.8",
                        "components": ["Microsoft.VisualStudio.Component.VC.Tools.x86.x64"],
                        "prefer64bit": true
                    }
                }
            }"#,
        )
        .unwrap();
        let req = manifest.tools.vs_requirement().unwrap();
        assert_eq!(req.version, "16.8");
        assert_eq!(req.components.len(), 1);
        assert!(req.prefer_64bit);
    }

    #[test]
    fn test_parse_runtimes_and_overrides() {
        let manifest: GlobalJson = serde_json::from_str(
            r#"{
                "tools": {
                    "dotnet": "8.0.100",
                    "runtimes": { "dotnet": ["6.0.0", "8.0.0"], "aspnetcore": ["8.0.0"] },
                    "vswhere": "2.8.4",
                    "dotnetInstallScriptVersion": "v2"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.tools.runtimes["dotnet"], vec!["6.0.0", "8.0.0"]);
        assert_eq!(manifest.tools.vswhere.as_deref(), Some("2.8.4"));
        assert_eq!(
            manifest.tools.dotnet_install_script_version.as_deref(),
            Some("v2")
        );
    }

    #[test]
    fn test_missing_tools_section_defaults_empty() {
        let manifest: GlobalJson =
            serde_json::from_str(r#"{ "sdk": { "version": "8.0.100" } }"#).unwrap();
        assert!(manifest.tools.dotnet.is_none());
        assert!(manifest.tools.vs.is_none());
    }
}
