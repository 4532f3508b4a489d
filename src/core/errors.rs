//! Bootstrap error types.

use thiserror::Error;

/// Fatal failures raised while preparing or running the build engine.
///
/// Nothing here is retried automatically except the installer's feed list;
/// every variant terminates the process with a nonzero exit code and a
/// one-line diagnostic.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("malformed version string `{input}`")]
    MalformedVersion { input: String },

    /// An explicitly activated developer shell carries an engine older than
    /// the minimum. Surfaced immediately; never falls through to other
    /// discovery strategies.
    #[error(
        "Developer Command Prompt for VS {found} is not recent enough. \
         Please upgrade to {required} or build from a plain CMD window."
    )]
    IncompatibleEnvironment { found: String, required: String },

    #[error("unable to find Visual Studio that has required version and components installed")]
    NoCompatibleInstance,

    #[error("failed to install {label} from any of the specified locations")]
    InstallFailed { label: String },

    #[error("{0}")]
    CiPolicyViolation(String),

    /// The engine itself failed; its exit code is propagated verbatim.
    #[error("build failed with exit code {code}")]
    EngineFailed { code: i32 },
}

impl BootstrapError {
    /// Title used when rendering the failure as a CI pipeline annotation.
    pub fn pipeline_title(&self) -> &'static str {
        match self {
            BootstrapError::CiPolicyViolation(_) | BootstrapError::EngineFailed { .. } => "Build",
            _ => "InitializeToolset",
        }
    }
}
