//! Standard MSBuild invocation.
//!
//! Every engine launch goes through here: CI policy validation, the fixed
//! argument set shared by all invocations, the CI-only NuGet retry
//! environment, and exit-code propagation.

use std::env;

use anyhow::Result;

use crate::core::config::BuildConfig;
use crate::core::errors::BootstrapError;
use crate::toolchain::{EngineKind, ToolResolver};
use crate::util::process::ProcessBuilder;

/// Retry tuning applied under CI with the dotnet-hosted engine, where
/// package-registry networking is flaky enough to need it.
pub const NUGET_RETRY_ENV: &[(&str, &str)] = &[
    ("NUGET_ENABLE_ENHANCED_HTTP_RETRY", "true"),
    ("NUGET_ENHANCED_MAX_NETWORK_TRY_COUNT", "6"),
    ("NUGET_ENHANCED_NETWORK_RETRY_DELAY_MILLISECONDS", "1000"),
    ("NUGET_RETRY_HTTP_429", "true"),
    ("NUGET_PLUGIN_HANDSHAKE_TIMEOUT_IN_SECONDS", "20"),
    ("NUGET_PLUGIN_REQUEST_TIMEOUT_IN_SECONDS", "20"),
];

/// Run the engine with the standard arguments plus `args`.
///
/// CI policy is validated before toolchain resolution so a violation
/// aborts before any subprocess is spawned. A nonzero engine exit becomes
/// [`BootstrapError::EngineFailed`] carrying the code verbatim.
pub fn run_msbuild(
    config: &BuildConfig,
    resolver: &mut ToolResolver,
    args: &[String],
) -> Result<()> {
    if config.ci {
        validate_ci(config)?;
    }

    let tool = resolver.build_tool(config)?;

    if config.ci && tool.kind == EngineKind::Dotnet {
        tracing::info!("Setting NuGet enhanced retry environment variables.");
        for (key, value) in NUGET_RETRY_ENV {
            env::set_var(key, value);
        }
    }

    let mut invocation = Vec::new();
    if let Some(command) = &tool.command {
        invocation.push(command.clone());
    }
    invocation.extend(standard_args(config));
    invocation.extend(args.iter().cloned());

    tracing::debug!(
        "Running {} {}",
        tool.path.display(),
        invocation.join(" ")
    );

    let status = ProcessBuilder::new(&tool.path).args(&invocation).status()?;
    if !status.success() {
        let code = status.code().unwrap_or(1);
        return Err(BootstrapError::EngineFailed { code }.into());
    }

    Ok(())
}

/// The invariants a CI build must hold before the engine may launch.
pub fn validate_ci(config: &BuildConfig) -> Result<(), BootstrapError> {
    if !config.binary_log && !config.exclude_ci_binary_log {
        return Err(BootstrapError::CiPolicyViolation(
            "binary log must be enabled in CI build, or explicitly opted out from with \
             the --exclude-ci-binary-log switch"
                .to_string(),
        ));
    }

    // Reusing engine worker processes across CI jobs causes stale-state
    // bugs; it must stay off.
    if config.node_reuse {
        return Err(BootstrapError::CiPolicyViolation(
            "node reuse must be disabled in CI build".to_string(),
        ));
    }

    Ok(())
}

/// The fixed and configuration-derived arguments every invocation gets.
pub fn standard_args(config: &BuildConfig) -> Vec<String> {
    let mut args = vec![
        "/maxCpuCount".to_string(),
        "/nologo".to_string(),
        "/consoleLoggerParameters:Summary".to_string(),
        format!("/verbosity:{}", config.verbosity),
        format!("/nodeReuse:{}", config.node_reuse),
        format!("/p:ContinuousIntegrationBuild={}", config.ci),
        format!("/p:TreatWarningsAsErrors={}", config.warn_as_error),
    ];

    if config.warn_as_error {
        args.push("/warnAsError".to_string());
    }

    if let Some(feed) = &config.push_nupkgs_local {
        args.push(format!("/p:OutputBlobFeedDir={}", feed.display()));
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(overrides: ConfigOverrides) -> (TempDir, BuildConfig) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("global.json"),
            r#"{ "tools": { "dotnet": "8.0.100" } }"#,
        )
        .unwrap();
        let config = BuildConfig::new(overrides, tmp.path()).unwrap();
        (tmp, config)
    }

    #[test]
    fn test_ci_requires_binary_log() {
        let (_tmp, config) = config(ConfigOverrides {
            ci: true,
            binary_log: Some(false),
            ..Default::default()
        });

        let error = validate_ci(&config).unwrap_err();
        assert!(matches!(error, BootstrapError::CiPolicyViolation(_)));
    }

    #[test]
    fn test_ci_binary_log_opt_out_is_honored() {
        let (_tmp, config) = config(ConfigOverrides {
            ci: true,
            exclude_ci_binary_log: true,
            node_reuse: Some(false),
            ..Default::default()
        });

        assert!(validate_ci(&config).is_ok());
    }

    #[test]
    fn test_ci_rejects_node_reuse() {
        let (_tmp, config) = config(ConfigOverrides {
            ci: true,
            node_reuse: Some(true),
            ..Default::default()
        });

        let error = validate_ci(&config).unwrap_err();
        assert!(matches!(error, BootstrapError::CiPolicyViolation(_)));
    }

    #[test]
    fn test_ci_defaults_satisfy_policy() {
        let (_tmp, config) = config(ConfigOverrides {
            ci: true,
            ..Default::default()
        });

        assert!(validate_ci(&config).is_ok());
    }

    #[test]
    fn test_ci_violation_aborts_before_resolution() {
        use crate::toolchain::{BuildTool, DotnetCli, EngineLocator};

        struct PanickingLocator;
        impl EngineLocator for PanickingLocator {
            fn locate(
                &mut self,
                _config: &BuildConfig,
                _dotnet: &mut DotnetCli,
            ) -> anyhow::Result<BuildTool> {
                panic!("locator must not run when CI policy is violated");
            }
        }

        let (_tmp, config) = config(ConfigOverrides {
            ci: true,
            binary_log: Some(false),
            ..Default::default()
        });

        let mut resolver = ToolResolver::with_locator(Box::new(PanickingLocator));
        let error = run_msbuild(&config, &mut resolver, &[]).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::CiPolicyViolation(_))
        ));
    }

    #[test]
    fn test_standard_args_defaults() {
        let (_tmp, config) = config(ConfigOverrides::default());
        let args = standard_args(&config);

        assert!(args.contains(&"/maxCpuCount".to_string()));
        assert!(args.contains(&"/nologo".to_string()));
        assert!(args.contains(&"/verbosity:minimal".to_string()));
        assert!(args.contains(&"/nodeReuse:true".to_string()));
        assert!(args.contains(&"/p:ContinuousIntegrationBuild=false".to_string()));
        assert!(args.contains(&"/p:TreatWarningsAsErrors=true".to_string()));
        assert!(args.contains(&"/warnAsError".to_string()));
    }

    #[test]
    fn test_standard_args_without_warn_as_error() {
        let (_tmp, config) = config(ConfigOverrides {
            warn_as_error: Some(false),
            ..Default::default()
        });
        let args = standard_args(&config);

        assert!(args.contains(&"/p:TreatWarningsAsErrors=false".to_string()));
        assert!(!args.contains(&"/warnAsError".to_string()));
    }

    #[test]
    fn test_standard_args_local_feed_property() {
        let (_tmp, config) = config(ConfigOverrides {
            push_nupkgs_local: Some(PathBuf::from("/feeds/local")),
            ..Default::default()
        });
        let args = standard_args(&config);

        assert!(args.contains(&"/p:OutputBlobFeedDir=/feeds/local".to_string()));
    }
}
