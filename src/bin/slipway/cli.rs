//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use slipway::core::config::ConfigOverrides;

/// Slipway - bootstrap the build toolchain and run MSBuild
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Build configuration (e.g. Debug or Release)
    #[arg(short = 'c', long)]
    pub configuration: Option<String>,

    /// Target platform forwarded to the engine (Windows repositories)
    #[arg(long)]
    pub platform: Option<String>,

    /// MSBuild verbosity level
    #[arg(short = 'v', long)]
    pub verbosity: Option<String>,

    /// Output a binary log from the engine
    #[arg(long, alias = "bl", num_args = 0..=1, default_missing_value = "true")]
    pub binary_log: Option<bool>,

    /// Restore toolsets and dependencies (default: true)
    #[arg(short = 'r', long, num_args = 0..=1, default_missing_value = "true")]
    pub restore: Option<bool>,

    /// Build the projects
    #[arg(short = 'b', long)]
    pub build: bool,

    /// Rebuild (clean + build) the projects
    #[arg(long)]
    pub rebuild: bool,

    /// Run the test projects
    #[arg(short = 't', long)]
    pub test: bool,

    /// Run source generation
    #[arg(short = 'g', long)]
    pub generate: bool,

    /// Package build outputs into NuGet packages
    #[arg(long)]
    pub pack: bool,

    /// Publish output artifacts (packages, symbols)
    #[arg(long)]
    pub publish: bool,

    /// Delete the artifacts directory and exit
    #[arg(long)]
    pub clean: bool,

    /// Product build; implies --restore, --build and --pack
    #[arg(long, alias = "pb")]
    pub product_build: bool,

    /// Publish packages into a local NuGet feed at the given path
    #[arg(long)]
    pub push_nupkgs_local: Option<PathBuf>,

    /// Semicolon-separated list of project paths to build
    #[arg(long)]
    pub projects: Option<String>,

    /// Running on a CI server (PR validation or official build)
    #[arg(long)]
    pub ci: bool,

    /// Opt out of the CI binary-log requirement
    #[arg(long, alias = "nobl")]
    pub exclude_ci_binary_log: bool,

    /// Reuse MSBuild worker nodes between invocations
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub node_reuse: Option<bool>,

    /// Treat MSBuild warnings as errors
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub warn_as_error: Option<bool>,

    /// MSBuild engine to use: 'vs' or 'dotnet' (Windows only)
    #[arg(long)]
    pub msbuild_engine: Option<String>,

    /// Ignore prerelease Visual Studio installations (Windows only)
    #[arg(long)]
    pub exclude_prerelease_vs: bool,

    /// Additional arguments passed to MSBuild verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub engine_args: Vec<String>,
}

impl Cli {
    /// Map the parsed command line onto configuration overrides.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            projects: self.projects.clone(),
            configuration: self.configuration.clone(),
            platform: self.platform.clone(),
            verbosity: self.verbosity.clone(),
            binary_log: self.binary_log,
            restore: self.restore,
            build: self.build,
            rebuild: self.rebuild,
            test: self.test,
            generate: self.generate,
            pack: self.pack,
            publish: self.publish,
            clean: self.clean,
            product_build: self.product_build,
            push_nupkgs_local: self.push_nupkgs_local.clone(),
            ci: self.ci,
            exclude_ci_binary_log: self.exclude_ci_binary_log,
            node_reuse: self.node_reuse,
            warn_as_error: self.warn_as_error,
            msbuild_engine: self.msbuild_engine.clone(),
            exclude_prerelease_vs: self.exclude_prerelease_vs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tri_state_flags() {
        let cli = Cli::parse_from(["slipway", "--node-reuse", "false", "--binary-log"]);
        assert_eq!(cli.node_reuse, Some(false));
        assert_eq!(cli.binary_log, Some(true));
        assert_eq!(cli.warn_as_error, None);
    }

    #[test]
    fn test_passthrough_args() {
        let cli = Cli::parse_from([
            "slipway",
            "--build",
            "/p:SkipTests=true",
            "/p:OfficialBuildId=20260808.1",
        ]);
        assert!(cli.build);
        assert_eq!(
            cli.engine_args,
            vec!["/p:SkipTests=true", "/p:OfficialBuildId=20260808.1"]
        );
    }

    #[test]
    fn test_overrides_mapping() {
        let cli = Cli::parse_from(["slipway", "-c", "Release", "--ci", "--product-build"]);
        let overrides = cli.overrides();

        assert_eq!(overrides.configuration.as_deref(), Some("Release"));
        assert!(overrides.ci);
        assert!(overrides.product_build);
        assert!(overrides.binary_log.is_none());
    }
}
