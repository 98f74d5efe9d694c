//! # fieldkey-core
//!
//! Core types, traits, and abstractions for the fieldkey export engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other fieldkey crates depend on.

pub mod defaults;
pub mod error;
pub mod freshness;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use freshness::{artifact_dir_name, artifact_file_name, artifact_prefix, freshness_key};
pub use models::*;
pub use traits::*;
