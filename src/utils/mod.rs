//! Shared utilities.
//!
//! - [`exec`]: synchronous external command execution and output filtering
//! - [`hash`]: FxHash message keys and blake3 content fingerprints
//! - [`path`]: filesystem path normalization

pub mod exec;
pub mod hash;
pub mod path;
