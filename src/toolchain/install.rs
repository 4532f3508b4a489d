//! On-disk installation of .NET SDKs and runtimes.
//!
//! Installation goes through the official `dotnet-install` script, fetched
//! once into the install root. Each requested (version, architecture,
//! runtime) tuple is attempted first against the default feed and then
//! against the CI mirror, stopping at the first success.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::errors::BootstrapError;
use crate::core::manifest::GlobalJson;
use crate::util::download::download_to;
use crate::util::fs::{ensure_dir, make_executable};
use crate::util::process::ProcessBuilder;

pub const DEFAULT_INSTALL_SCRIPT_VERSION: &str = "v1";

const INSTALL_SCRIPT_BASE_URL: &str = "https://builds.dotnet.microsoft.com/dotnet/scripts";
const SECONDARY_FEED: &str = "https://ci.dot.net/public";

/// What flavor of installation the script should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Sdk,
    Dotnet,
    AspNetCore,
    WindowsDesktop,
}

impl RuntimeKind {
    /// Parse a runtime name from the manifest's `tools.runtimes` map.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sdk" => Ok(RuntimeKind::Sdk),
            "dotnet" => Ok(RuntimeKind::Dotnet),
            "aspnetcore" => Ok(RuntimeKind::AspNetCore),
            "windowsdesktop" => Ok(RuntimeKind::WindowsDesktop),
            _ => bail!("unknown runtime kind `{}` in global.json", name),
        }
    }

    /// Name as passed to the install script's runtime flag.
    pub fn script_name(&self) -> &'static str {
        match self {
            RuntimeKind::Sdk => "sdk",
            RuntimeKind::Dotnet => "dotnet",
            RuntimeKind::AspNetCore => "aspnetcore",
            RuntimeKind::WindowsDesktop => "windowsdesktop",
        }
    }

    /// Shared-framework directory a non-SDK runtime installs into.
    fn shared_dir(&self) -> Option<&'static str> {
        match self {
            RuntimeKind::Sdk => None,
            RuntimeKind::Dotnet => Some("Microsoft.NETCore.App"),
            RuntimeKind::AspNetCore => Some("Microsoft.AspNetCore.App"),
            RuntimeKind::WindowsDesktop => Some("Microsoft.WindowsDesktop.App"),
        }
    }
}

/// One requested installation.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub version: String,
    /// `None` or `"unset"` lets the script pick the host architecture.
    pub architecture: Option<String>,
    pub runtime: RuntimeKind,
    pub skip_non_versioned_files: bool,
    pub no_path: bool,
}

impl InstallRequest {
    /// The SDK install the repository manifest pins.
    pub fn sdk(version: &str) -> Self {
        InstallRequest {
            version: version.to_string(),
            architecture: None,
            runtime: RuntimeKind::Sdk,
            skip_non_versioned_files: cfg!(not(windows)),
            no_path: false,
        }
    }

    /// A bare runtime install.
    pub fn runtime(kind: RuntimeKind, version: &str) -> Self {
        InstallRequest {
            version: version.to_string(),
            architecture: None,
            runtime: kind,
            skip_non_versioned_files: true,
            no_path: false,
        }
    }

    /// Human-readable label used in progress and failure messages.
    fn label(&self) -> String {
        match self.runtime {
            RuntimeKind::Sdk => format!("'sdk v{}'", self.version),
            _ => format!(
                "runtime toolset '{}/{} v{}'",
                self.runtime.script_name(),
                self.architecture.as_deref().unwrap_or(""),
                self.version
            ),
        }
    }
}

/// Executes an install script and reports its exit code.
///
/// A seam so installation logic can be exercised without shelling out.
pub trait ScriptRunner {
    fn run(&mut self, script: &Path, args: &[String]) -> Result<i32>;
}

/// Runs the script with the host shell (`powershell.exe -File` on Windows,
/// direct execution elsewhere) with inherited standard streams.
pub struct HostScriptRunner;

impl ScriptRunner for HostScriptRunner {
    fn run(&mut self, script: &Path, args: &[String]) -> Result<i32> {
        let builder = if cfg!(windows) {
            ProcessBuilder::new("powershell.exe")
                .arg("-File")
                .arg(script)
                .args(args)
        } else {
            ProcessBuilder::new(script).args(args)
        };
        let status = builder.status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Installs .NET toolchains via the on-line install script.
#[derive(Debug, Clone)]
pub struct DotnetInstaller {
    script_version: String,
}

impl DotnetInstaller {
    pub fn new() -> Self {
        DotnetInstaller {
            script_version: DEFAULT_INSTALL_SCRIPT_VERSION.to_string(),
        }
    }

    /// Honor a script-version pin from the manifest, if any.
    pub fn from_manifest(manifest: &GlobalJson) -> Self {
        DotnetInstaller {
            script_version: manifest
                .tools
                .dotnet_install_script_version
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTALL_SCRIPT_VERSION.to_string()),
        }
    }

    /// Install the SDK version pinned by the manifest into `root`.
    pub fn install_sdk(&self, root: &Path, version: &str) -> Result<()> {
        self.install(root, &InstallRequest::sdk(version))
    }

    /// Install a bare runtime into `root`.
    pub fn install_runtime(&self, root: &Path, kind: RuntimeKind, version: &str) -> Result<()> {
        self.install(root, &InstallRequest::runtime(kind, version))
    }

    /// Install `request` into `root`, trying each feed in order.
    pub fn install(&self, root: &Path, request: &InstallRequest) -> Result<()> {
        self.install_with(root, request, &mut HostScriptRunner)
    }

    /// Like [`install`](Self::install), with an explicit script runner.
    pub fn install_with(
        &self,
        root: &Path,
        request: &InstallRequest,
        runner: &mut dyn ScriptRunner,
    ) -> Result<()> {
        let label = request.label();

        // Non-SDK runtimes land in exactly one version-stamped directory,
        // so an existing directory proves the install. SDKs are verified by
        // the locator's own sdk/<version> probe and never short-circuited
        // here.
        if let Some(shared) = request.runtime.shared_dir() {
            let runtime_path = root.join("shared").join(shared).join(&request.version);
            if runtime_path.exists() {
                tracing::info!("{} already installed.", label);
                return Ok(());
            }
        }

        let script = self.ensure_install_script(root)?;

        for attempt in install_attempts(request, root, cfg!(windows)) {
            tracing::info!("Attempting to install {} from {}.", label, attempt.feed);

            if runner.run(&script, &attempt.args)? == 0 {
                return Ok(());
            }

            tracing::warn!("Failed to install {} from {}.", label, attempt.feed);
        }

        Err(BootstrapError::InstallFailed { label }.into())
    }

    /// Fetch the platform-appropriate install script into `root` if it is
    /// not already cached there, and make it executable.
    pub fn ensure_install_script(&self, root: &Path) -> Result<PathBuf> {
        let name = if cfg!(windows) {
            "dotnet-install.ps1"
        } else {
            "dotnet-install.sh"
        };
        let script = root.join(name);

        if !script.exists() {
            ensure_dir(root)?;
            let url = format!(
                "{}/{}/{}",
                INSTALL_SCRIPT_BASE_URL, self.script_version, name
            );
            download_to(&url, &script)?;
            make_executable(&script)?;
        }

        Ok(script)
    }
}

impl Default for DotnetInstaller {
    fn default() -> Self {
        Self::new()
    }
}

struct InstallAttempt {
    feed: String,
    args: Vec<String>,
}

/// The ordered attempt list: plain request against the default feed, then
/// the same request against the CI mirror.
fn install_attempts(request: &InstallRequest, root: &Path, windows: bool) -> Vec<InstallAttempt> {
    vec![
        InstallAttempt {
            feed: "public location".to_string(),
            args: script_args(request, root, None, windows),
        },
        InstallAttempt {
            feed: SECONDARY_FEED.to_string(),
            args: script_args(request, root, Some(SECONDARY_FEED), windows),
        },
    ]
}

/// Translate a request into install-script arguments, using the script's
/// POSIX (`--flag`) or PowerShell (`-Flag`) spelling.
fn script_args(
    request: &InstallRequest,
    root: &Path,
    azure_feed: Option<&str>,
    windows: bool,
) -> Vec<String> {
    let flag = |posix: &str, powershell: &str| {
        let spelling = if windows { powershell } else { posix };
        spelling.to_string()
    };

    let mut args = vec![
        flag("--version", "-Version"),
        request.version.clone(),
        flag("--install-dir", "-InstallDir"),
        root.display().to_string(),
    ];

    if let Some(architecture) = &request.architecture {
        if !architecture.is_empty() && architecture != "unset" {
            args.push(flag("--architecture", "-Architecture"));
            args.push(architecture.clone());
        }
    }
    if request.runtime != RuntimeKind::Sdk {
        args.push(flag("--runtime", "-Runtime"));
        args.push(request.runtime.script_name().to_string());
    }
    if request.skip_non_versioned_files {
        args.push(flag("--skip-non-versioned-files", "-SkipNonVersionedFiles"));
    }
    if request.no_path {
        args.push(flag("--no-path", "-NoPath"));
    }
    if let Some(feed) = azure_feed {
        args.push(flag("--azure-feed", "-AzureFeed"));
        args.push(feed.to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Runner that replays a scripted list of exit codes.
    struct ScriptedRunner {
        codes: Vec<i32>,
        calls: Vec<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(codes: Vec<i32>) -> Self {
            ScriptedRunner {
                codes,
                calls: Vec::new(),
            }
        }
    }

    impl ScriptRunner for ScriptedRunner {
        fn run(&mut self, _script: &Path, args: &[String]) -> Result<i32> {
            let index = self.calls.len();
            self.calls.push(args.to_vec());
            Ok(self.codes.get(index).copied().unwrap_or(1))
        }
    }

    fn installer_with_cached_script(root: &Path) -> DotnetInstaller {
        // Pre-seed the script so ensure_install_script never touches the
        // network in tests.
        let name = if cfg!(windows) {
            "dotnet-install.ps1"
        } else {
            "dotnet-install.sh"
        };
        std::fs::create_dir_all(root).unwrap();
        std::fs::write(root.join(name), "#!/bin/sh\nexit 0\n").unwrap();
        DotnetInstaller::new()
    }

    #[test]
    fn test_first_feed_success_stops_there() {
        let tmp = TempDir::new().unwrap();
        let installer = installer_with_cached_script(tmp.path());
        let mut runner = ScriptedRunner::new(vec![0]);

        installer
            .install_with(tmp.path(), &InstallRequest::sdk("8.0.100"), &mut runner)
            .unwrap();

        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn test_mirror_fallback_succeeds_without_third_attempt() {
        let tmp = TempDir::new().unwrap();
        let installer = installer_with_cached_script(tmp.path());
        let mut runner = ScriptedRunner::new(vec![1, 0]);

        installer
            .install_with(tmp.path(), &InstallRequest::sdk("8.0.100"), &mut runner)
            .unwrap();

        assert_eq!(runner.calls.len(), 2);
        // The fallback attempt points at the secondary feed.
        assert!(runner.calls[1].iter().any(|arg| arg == SECONDARY_FEED));
        assert!(!runner.calls[0].iter().any(|arg| arg == SECONDARY_FEED));
    }

    #[test]
    fn test_all_feeds_exhausted_is_install_failed() {
        let tmp = TempDir::new().unwrap();
        let installer = installer_with_cached_script(tmp.path());
        let mut runner = ScriptedRunner::new(vec![1, 1]);

        let error = installer
            .install_with(tmp.path(), &InstallRequest::sdk("8.0.100"), &mut runner)
            .unwrap_err();

        assert_eq!(runner.calls.len(), 2);
        assert!(matches!(
            error.downcast_ref::<BootstrapError>(),
            Some(BootstrapError::InstallFailed { .. })
        ));
    }

    #[test]
    fn test_existing_runtime_dir_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let installer = installer_with_cached_script(tmp.path());
        std::fs::create_dir_all(
            tmp.path()
                .join("shared")
                .join("Microsoft.NETCore.App")
                .join("8.0.0"),
        )
        .unwrap();

        let mut runner = ScriptedRunner::new(vec![]);
        installer
            .install_with(
                tmp.path(),
                &InstallRequest::runtime(RuntimeKind::Dotnet, "8.0.0"),
                &mut runner,
            )
            .unwrap();

        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_sdk_install_never_short_circuits_on_sdk_dir() {
        let tmp = TempDir::new().unwrap();
        let installer = installer_with_cached_script(tmp.path());
        std::fs::create_dir_all(tmp.path().join("sdk").join("8.0.100")).unwrap();

        let mut runner = ScriptedRunner::new(vec![0]);
        installer
            .install_with(tmp.path(), &InstallRequest::sdk("8.0.100"), &mut runner)
            .unwrap();

        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn test_script_args_posix_spelling() {
        let request = InstallRequest {
            version: "8.0.0".to_string(),
            architecture: Some("x64".to_string()),
            runtime: RuntimeKind::AspNetCore,
            skip_non_versioned_files: true,
            no_path: true,
        };
        let args = script_args(&request, Path::new("/repo/.dotnet"), None, false);

        assert_eq!(
            args,
            vec![
                "--version",
                "8.0.0",
                "--install-dir",
                "/repo/.dotnet",
                "--architecture",
                "x64",
                "--runtime",
                "aspnetcore",
                "--skip-non-versioned-files",
                "--no-path",
            ]
        );
    }

    #[test]
    fn test_script_args_powershell_spelling() {
        let request = InstallRequest::sdk("8.0.100");
        let args = script_args(&request, Path::new("C:/repo/.dotnet"), Some(SECONDARY_FEED), true);

        assert!(args.contains(&"-Version".to_string()));
        assert!(args.contains(&"-InstallDir".to_string()));
        assert!(args.contains(&"-AzureFeed".to_string()));
        assert!(args.contains(&SECONDARY_FEED.to_string()));
        // SDK installs carry no runtime flag.
        assert!(!args.contains(&"-Runtime".to_string()));
    }

    #[test]
    fn test_unset_architecture_is_omitted() {
        let mut request = InstallRequest::sdk("8.0.100");
        request.architecture = Some("unset".to_string());
        let args = script_args(&request, Path::new("/repo/.dotnet"), None, false);
        assert!(!args.contains(&"--architecture".to_string()));
    }

    #[test]
    fn test_runtime_kind_names() {
        assert_eq!(
            RuntimeKind::from_name("aspnetcore").unwrap(),
            RuntimeKind::AspNetCore
        );
        assert!(RuntimeKind::from_name("mono").is_err());
    }
}
