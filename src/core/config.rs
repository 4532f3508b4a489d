//! Resolved build configuration and repository layout.
//!
//! `BuildConfig` is constructed once at process start from the parsed
//! command line plus the repository manifest, and is never mutated
//! afterwards. Everything downstream (locators, installer, dispatcher)
//! reads it by reference.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::GlobalJson;
use crate::toolchain::EngineKind;
use crate::util::fs::ensure_dir;

/// Raw values carried over from the command line.
///
/// `Option` fields distinguish "not given" from an explicit value so the
/// defaults below can depend on other flags (binary logging defaults on
/// under CI, node reuse defaults off under CI).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub projects: Option<String>,
    pub configuration: Option<String>,
    pub platform: Option<String>,
    pub verbosity: Option<String>,
    pub binary_log: Option<bool>,
    pub restore: Option<bool>,
    pub build: bool,
    pub rebuild: bool,
    pub test: bool,
    pub generate: bool,
    pub pack: bool,
    pub publish: bool,
    pub clean: bool,
    pub product_build: bool,
    pub push_nupkgs_local: Option<PathBuf>,
    pub ci: bool,
    pub exclude_ci_binary_log: bool,
    pub node_reuse: Option<bool>,
    pub warn_as_error: Option<bool>,
    pub msbuild_engine: Option<String>,
    pub exclude_prerelease_vs: bool,
}

/// Immutable, fully-resolved process configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project paths to build, already split from the `;`-joined flag.
    pub projects: Vec<String>,
    pub configuration: String,
    pub platform: Option<String>,
    pub verbosity: String,
    pub ci: bool,
    pub binary_log: bool,
    pub exclude_ci_binary_log: bool,
    pub restore: bool,
    pub build: bool,
    pub rebuild: bool,
    pub test: bool,
    pub generate: bool,
    pub pack: bool,
    pub publish: bool,
    pub clean: bool,
    pub product_build: bool,
    /// Local NuGet feed directory; presence implies `publish`.
    pub push_nupkgs_local: Option<PathBuf>,
    pub node_reuse: bool,
    pub warn_as_error: bool,
    /// Engine override from the command line (Windows only; ignored by the
    /// POSIX locator, which has a single engine).
    pub msbuild_engine: Option<EngineKind>,
    pub exclude_prerelease_vs: bool,
    /// Probe PATH for an already-installed .NET CLI before downloading one.
    pub use_installed_dotnet_cli: bool,
    /// Off under CI: packages restore into the artifacts tree instead.
    pub use_global_nuget_cache: bool,

    pub repo_root: PathBuf,
    pub eng_root: PathBuf,
    pub artifacts_dir: PathBuf,
    pub toolset_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub log_dir: PathBuf,
    pub temp_dir: PathBuf,

    pub global_json: GlobalJson,
}

impl BuildConfig {
    /// Resolve the configuration for `repo_root`, reading `global.json`,
    /// creating the artifacts layout, and applying the HOME fallback.
    pub fn new(overrides: ConfigOverrides, repo_root: impl Into<PathBuf>) -> Result<Self> {
        let repo_root = repo_root.into();
        let global_json = GlobalJson::load(&repo_root.join("global.json"))?;

        let ci = overrides.ci;
        let exclude_ci_binary_log = overrides.exclude_ci_binary_log;
        let product_build = overrides.product_build;

        let mut configuration = overrides
            .configuration
            .clone()
            .unwrap_or_else(|| "Debug".to_string());
        let mut restore = overrides.restore.unwrap_or(true);
        let mut build = overrides.build;
        let mut pack = overrides.pack;
        let mut publish = overrides.publish;

        if product_build {
            // A product build also implies build, restore, and pack.
            build = true;
            restore = true;
            pack = true;

            if overrides.configuration.is_none() {
                configuration = "Release".to_string();
            }
        }

        let push_nupkgs_local = overrides
            .push_nupkgs_local
            .as_deref()
            .map(|path| crate::util::fs::absolutize(path))
            .transpose()?;
        if push_nupkgs_local.is_some() {
            // A local feed publishing directory also implies publish.
            publish = true;
        }

        let msbuild_engine = overrides
            .msbuild_engine
            .as_deref()
            .map(|name| {
                name.parse::<EngineKind>()
                    .map_err(|message| anyhow::anyhow!(message))
            })
            .transpose()?;

        let projects = overrides
            .projects
            .as_deref()
            .map(|list| {
                list.split(';')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let eng_root = repo_root.join("eng");
        let artifacts_dir = repo_root.join("artifacts");
        let toolset_dir = artifacts_dir.join("toolset");
        let tools_dir = repo_root.join(".tools");
        let log_dir = artifacts_dir.join("log").join(&configuration);
        let temp_dir = artifacts_dir.join("tmp").join(&configuration);

        // HOME may not be defined in some scenarios, but NuGet requires it.
        if env::var_os("HOME").map_or(true, |home| home.is_empty()) {
            let home = artifacts_dir.join(".home");
            ensure_dir(&home)?;
            env::set_var("HOME", &home);
        }

        ensure_dir(&toolset_dir)?;
        ensure_dir(&temp_dir)?;
        ensure_dir(&log_dir)?;

        Ok(BuildConfig {
            projects,
            configuration,
            platform: overrides.platform,
            verbosity: overrides
                .verbosity
                .unwrap_or_else(|| "minimal".to_string()),
            ci,
            binary_log: overrides
                .binary_log
                .unwrap_or(ci && !exclude_ci_binary_log),
            exclude_ci_binary_log,
            restore,
            build,
            rebuild: overrides.rebuild,
            test: overrides.test,
            generate: overrides.generate,
            pack,
            publish,
            clean: overrides.clean,
            product_build,
            push_nupkgs_local,
            node_reuse: overrides.node_reuse.unwrap_or(!ci),
            warn_as_error: overrides.warn_as_error.unwrap_or(true),
            msbuild_engine,
            exclude_prerelease_vs: overrides.exclude_prerelease_vs,
            use_installed_dotnet_cli: true,
            use_global_nuget_cache: !ci,
            repo_root,
            eng_root,
            artifacts_dir,
            toolset_dir,
            tools_dir,
            log_dir,
            temp_dir,
            global_json,
        })
    }

    /// The toolset entry project handed to the engine first.
    pub fn toolset_project(&self) -> PathBuf {
        self.eng_root.join("tools").join("Build.proj")
    }
}

/// Find the repository root by walking upward until `global.json` appears.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join("global.json").is_file() {
            return Ok(current);
        }
        if !current.pop() {
            bail!(
                "no global.json found in `{}` or any parent directory",
                start.display()
            );
        }
    }
}

/// Convenience for entry points: locate the repository from `cwd` and
/// resolve the configuration against it.
pub fn load_config(overrides: ConfigOverrides) -> Result<BuildConfig> {
    let cwd = env::current_dir().context("failed to get current directory")?;
    let repo_root = find_repo_root(&cwd)?;
    BuildConfig::new(overrides, repo_root)
}
