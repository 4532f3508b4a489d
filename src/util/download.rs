//! Blocking file downloads.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Download `url` into `dest`, creating parent directories as needed.
///
/// No retries here: callers that want fallback behavior (the installer's
/// feed list) implement it at their own level.
pub fn download_to(url: &str, dest: &Path) -> Result<()> {
    tracing::info!("Downloading '{}'", url);

    let response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to download {}", url))?;

    if !response.status().is_success() {
        bail!("failed to download {}: HTTP {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read response body from {}", url))?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::write(dest, &bytes)
        .with_context(|| format!("failed to write file: {}", dest.display()))?;

    Ok(())
}
