//! The build operation: toolset project selection and property assembly.

use anyhow::Result;

use crate::core::config::BuildConfig;
use crate::toolchain::ToolResolver;
use crate::util::fs::absolutize;

use super::msbuild::run_msbuild;

/// Drive a build: hand the toolset project plus the translated flag surface
/// to the engine, with any passthrough arguments appended verbatim.
pub fn run(
    config: &BuildConfig,
    resolver: &mut ToolResolver,
    passthrough: &[String],
) -> Result<()> {
    let mut args = vec![config.toolset_project().display().to_string()];
    args.extend(build_args(config)?);
    args.extend(passthrough.iter().cloned());

    run_msbuild(config, resolver, &args)
}

/// The property set describing what this invocation should do.
pub fn build_args(config: &BuildConfig) -> Result<Vec<String>> {
    let mut args = Vec::new();

    if !config.projects.is_empty() {
        // Resolve relative project paths into full paths.
        let projects = config
            .projects
            .iter()
            .map(|project| absolutize(project).map(|p| p.display().to_string()))
            .collect::<Result<Vec<_>>>()?;
        args.push(format!("/p:Projects={}", projects.join(";")));
    }

    if config.binary_log {
        args.push(format!(
            "/bl:{}",
            config.log_dir.join("Build.binlog").display()
        ));
    }

    if let Some(platform) = &config.platform {
        args.push(format!("/p:Platform={}", platform));
    }

    args.push(format!("/p:Configuration={}", config.configuration));
    args.push(format!("/p:RepoRoot={}", config.repo_root.display()));
    args.push(format!("/p:Restore={}", config.restore));
    args.push(format!("/p:Build={}", config.build));
    args.push(format!("/p:Rebuild={}", config.rebuild));
    args.push(format!("/p:Test={}", config.test));
    args.push(format!("/p:Generate={}", config.generate));
    args.push(format!("/p:Pack={}", config.pack));
    args.push(format!("/p:Publish={}", config.publish));
    args.push(format!("/p:ProductBuild={}", config.product_build));

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
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
    fn test_build_args_reflect_actions() {
        let (_tmp, config) = config(ConfigOverrides {
            build: true,
            test: true,
            ..Default::default()
        });
        let args = build_args(&config).unwrap();

        assert!(args.contains(&"/p:Configuration=Debug".to_string()));
        assert!(args.contains(&"/p:Restore=true".to_string()));
        assert!(args.contains(&"/p:Build=true".to_string()));
        assert!(args.contains(&"/p:Test=true".to_string()));
        assert!(args.contains(&"/p:Pack=false".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("/p:Projects=")));
        assert!(!args.iter().any(|a| a.starts_with("/bl:")));
    }

    #[test]
    fn test_build_args_projects_are_absolutized() {
        let (_tmp, config) = config(ConfigOverrides {
            projects: Some("src/A.csproj;src/B.csproj".to_string()),
            ..Default::default()
        });
        let args = build_args(&config).unwrap();

        let projects = args
            .iter()
            .find(|a| a.starts_with("/p:Projects="))
            .unwrap();
        let list = projects.trim_start_matches("/p:Projects=");
        assert_eq!(list.split(';').count(), 2);
        for project in list.split(';') {
            assert!(std::path::Path::new(project).is_absolute());
        }
    }

    #[test]
    fn test_build_args_binary_log_points_into_log_dir() {
        let (_tmp, config) = config(ConfigOverrides {
            binary_log: Some(true),
            ..Default::default()
        });
        let args = build_args(&config).unwrap();

        let bl = args.iter().find(|a| a.starts_with("/bl:")).unwrap();
        assert!(bl.ends_with("Build.binlog"));
        assert!(bl.contains("log"));
    }

    #[test]
    fn test_build_args_platform_is_forwarded() {
        let (_tmp, config) = config(ConfigOverrides {
            platform: Some("x64".to_string()),
            ..Default::default()
        });
        let args = build_args(&config).unwrap();
        assert!(args.contains(&"/p:Platform=x64".to_string()));
    }
}
