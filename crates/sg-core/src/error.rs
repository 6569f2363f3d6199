//! Unified error type for the ingestion pipeline.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the calling web handler to derive an HTTP status code via
//! [`Error::http_status`].

use std::path::PathBuf;

/// Unified error type covering all failure modes in songforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required bytes or metadata were absent from the upload.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// An external tool (ffmpeg, ffprobe) failed, was absent, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The probe tool produced output that could not be interpreted.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Writing to the durable media store failed.
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        /// Destination the write was aimed at.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A scratch file could not be created.
    #[error("Scratch error: {source}")]
    Scratch {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The enclosing request was aborted before the run finished.
    #[error("Cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::MissingInput(_) => 400,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Storage { .. } => 500,
            Error::Scratch { .. } => 500,
            // nginx's "client closed request".
            Error::Cancelled => 499,
            Error::Io { .. } => 500,
        }
    }

    /// Whether the caller (rather than the server) is at fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Convenience constructor for [`Error::MissingInput`].
    pub fn missing(what: impl Into<String>) -> Self {
        Error::MissingInput(what.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Convenience constructor for [`Error::Scratch`].
    pub fn scratch(source: std::io::Error) -> Self {
        Error::Scratch { source }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
