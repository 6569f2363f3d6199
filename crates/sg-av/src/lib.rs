//! # sg-av
//!
//! External tool management, scratch files, duration probing, and audio
//! transcoding for the songforged ingestion pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and kill-on-drop for running external processes.
//! - **Scratch files** ([`ScratchSpace`], [`ScratchFile`]) -- RAII temporary
//!   files released on every exit path.
//! - **Duration probing** ([`DurationProber`]) -- ffprobe with size-based and
//!   fixed fallbacks.
//! - **Transcoding** ([`Transcoder`]) -- ffmpeg encode into the canonical
//!   container with truthful passthrough on failure.

pub mod command;
pub mod probe;
pub mod scratch;
pub mod tools;
pub mod transcode;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::DurationProber;
pub use scratch::{Ownership, ScratchFile, ScratchSpace};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use transcode::{TranscodeKind, TranscodeOutcome, Transcoder};
