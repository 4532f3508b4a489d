//! High-level operations.
//!
//! This module contains the implementation of slipway's operations: the
//! standard MSBuild dispatch, the build driver, and artifact cleanup.

pub mod build;
pub mod clean;
pub mod msbuild;
