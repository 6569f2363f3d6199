//! sg-core: shared error type, media-domain enums, and configuration.
//!
//! This crate is the foundational dependency for the other sg-* crates. It
//! carries no I/O beyond config loading helpers.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
