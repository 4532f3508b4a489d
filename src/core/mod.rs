//! Core data structures for slipway.
//!
//! This module contains the foundational types used throughout the
//! bootstrapper: the resolved process configuration, the `global.json`
//! manifest schema, four-part engine versions, and the error taxonomy.

pub mod config;
pub mod errors;
pub mod manifest;
pub mod version;

pub use config::{find_repo_root, load_config, BuildConfig, ConfigOverrides};
pub use errors::BootstrapError;
pub use manifest::{GlobalJson, VsRequirement};
pub use version::EngineVersion;
