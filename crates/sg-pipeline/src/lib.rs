//! Song ingestion for songforged.
//!
//! An upload is staged into scratch space, probed for its duration,
//! transcoded to the canonical container when possible, given a
//! deterministic name from its artist and title, and committed to the media
//! store. [`IngestPipeline`] runs those stages; [`adapters`] holds the two
//! catalog entry points built on it.

pub mod adapters;
pub mod artifact;
pub mod naming;
pub mod orchestrator;
pub mod request;
pub mod state;
pub mod store;

pub use adapters::{admin_save, upload_form, AdminSave, SongFields, UploadForm};
pub use artifact::{IngestWarning, StoredArtifact};
pub use naming::{canonicalize, CanonicalName};
pub use orchestrator::{canonical_name_for, IngestFailure, IngestPipeline};
pub use request::{Lyrics, LyricsFormat, UploadRequest, UploadSource};
pub use state::{PipelineState, Stage, StateObserver};
pub use store::{FsMediaStore, MediaStore};

pub use tokio_util::sync::CancellationToken;
