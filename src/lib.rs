//! Slipway - a cross-platform bootstrapper for MSBuild-based repositories.
//!
//! This crate provides the core library functionality for slipway: reading
//! the repository's `global.json`, resolving (or installing) a compatible
//! build engine and toolchain, and launching MSBuild with a normalized
//! argument surface whose exit code the process propagates.

pub mod core;
pub mod ops;
pub mod toolchain;
pub mod util;

pub use crate::core::config::{BuildConfig, ConfigOverrides};
pub use crate::core::errors::BootstrapError;
pub use crate::core::manifest::{GlobalJson, VsRequirement};
pub use crate::core::version::EngineVersion;
pub use crate::toolchain::{BuildTool, EngineKind, ToolResolver};
