//! .NET CLI initialization and the dotnet-hosted engine locator.
//!
//! Initialization pins the process to one dotnet installation: machine-wide
//! lookup is disabled, the chosen root goes first on PATH, and the SDK the
//! manifest requires is installed locally when no adequate one is found.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::config::BuildConfig;
use crate::toolchain::install::{DotnetInstaller, RuntimeKind};
use crate::toolchain::{BuildTool, EngineKind, EngineLocator};

/// Memoized .NET CLI resolution.
///
/// The first call probes, installs, and mutates the environment; later
/// calls return the same root without re-doing any of it.
#[derive(Debug, Default)]
pub struct DotnetCli {
    install_dir: Option<PathBuf>,
}

impl DotnetCli {
    pub fn new() -> Self {
        DotnetCli { install_dir: None }
    }

    /// Resolve the dotnet root to use, installing the required SDK when
    /// `install` is set and nothing adequate is present.
    pub fn initialize(&mut self, config: &BuildConfig, install: bool) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }

        // Don't resolve runtime, shared framework, or SDK from other
        // locations; build determinism depends on using exactly one root.
        env::set_var("DOTNET_MULTILEVEL_LOOKUP", "0");

        // Disable first run since we want to control all package sources.
        env::set_var("DOTNET_NOLOGO", "1");

        // Disable telemetry.
        env::set_var("DOTNET_CLI_TELEMETRY_OPTOUT", "1");

        // LTTNG is the logging infrastructure used by Core CLR. Without a
        // home it warns on every invocation.
        #[cfg(unix)]
        {
            if let Some(home) = env::var_os("HOME") {
                env::set_var("LTTNG_HOME", home);
            }
        }

        let tools = &config.global_json.tools;
        let sdk_version = tools
            .dotnet
            .as_deref()
            .context("global.json must specify 'tools.dotnet'")?;

        // Find the first dotnet on PATH, unless the manifest pins extra
        // runtimes (which force a repo-local install) or the caller already
        // chose a root.
        if config.use_installed_dotnet_cli
            && tools.runtimes.is_empty()
            && env::var_os("DOTNET_INSTALL_DIR").is_none()
        {
            if let Ok(dotnet) = which::which("dotnet") {
                let dotnet = std::fs::canonicalize(&dotnet).unwrap_or(dotnet);
                if let Some(dir) = dotnet.parent() {
                    env::set_var("DOTNET_INSTALL_DIR", dir);
                }
            }
        }

        let preset_root = env::var_os("DOTNET_INSTALL_DIR").map(PathBuf::from);
        let dotnet_root = match preset_root {
            Some(root) if tools.runtimes.is_empty() && has_sdk(&root, sdk_version) => root,
            _ => {
                // Install to a repo-local directory to avoid permission
                // issues with machine-wide roots.
                let root = config.repo_root.join(".dotnet");
                env::set_var("DOTNET_INSTALL_DIR", &root);

                let installer = DotnetInstaller::from_manifest(&config.global_json);

                if !has_sdk(&root, sdk_version) {
                    if install {
                        installer.install_sdk(&root, sdk_version)?;
                    } else {
                        bail!("unable to find dotnet with SDK version: {}", sdk_version);
                    }
                }

                if install {
                    for (kind, versions) in &tools.runtimes {
                        let kind = RuntimeKind::from_name(kind)?;
                        for version in versions {
                            installer.install_runtime(&root, kind, version)?;
                        }
                    }
                }

                root
            }
        };

        // Put our dotnet first on PATH so bare invocations in custom build
        // steps cannot pick up another installation.
        prepend_path(&dotnet_root)?;

        if !config.use_global_nuget_cache {
            env::set_var("NUGET_PACKAGES", config.artifacts_dir.join(".packages"));
        }

        self.install_dir = Some(dotnet_root.clone());
        Ok(dotnet_root)
    }
}

fn has_sdk(root: &Path, version: &str) -> bool {
    root.join("sdk").join(version).is_dir()
}

fn prepend_path(dir: &Path) -> Result<()> {
    let path = env::var_os("PATH").unwrap_or_default();
    let mut entries = vec![dir.to_path_buf()];
    entries.extend(env::split_paths(&path));
    let joined = env::join_paths(entries).context("failed to rebuild PATH")?;
    env::set_var("PATH", joined);
    Ok(())
}

/// On POSIX hosts the dotnet-hosted engine is the only choice; locating it
/// reduces to initializing the CLI and pointing at the bundled command.
pub struct DotnetLocator;

impl EngineLocator for DotnetLocator {
    fn locate(&mut self, config: &BuildConfig, dotnet: &mut DotnetCli) -> Result<BuildTool> {
        let root = dotnet.initialize(config, config.restore)?;

        Ok(BuildTool {
            path: root.join("dotnet"),
            command: Some("msbuild".to_string()),
            kind: EngineKind::Dotnet,
            exclude_prerelease: config.exclude_prerelease_vs,
        })
    }
}
