//! The clean operation.

use anyhow::Result;

use crate::core::config::BuildConfig;
use crate::util::fs::remove_dir_all_if_exists;

/// Delete the artifacts directory.
pub fn run(config: &BuildConfig) -> Result<()> {
    if remove_dir_all_if_exists(&config.artifacts_dir)? {
        tracing::info!("Artifacts directory deleted.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_artifacts() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("global.json"),
            r#"{ "tools": { "dotnet": "8.0.100" } }"#,
        )
        .unwrap();

        // Construction creates the layout; clean removes all of it.
        let config = BuildConfig::new(ConfigOverrides::default(), tmp.path()).unwrap();
        assert!(config.artifacts_dir.exists());

        run(&config).unwrap();
        assert!(!config.artifacts_dir.exists());

        // Cleaning an already-clean tree is fine.
        run(&config).unwrap();
    }
}
