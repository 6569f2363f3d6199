//! The ingestion orchestrator.
//!
//! [`IngestPipeline`] runs one upload through
//! `Received -> Probed -> Transcoded -> Named -> Committed -> Done`. Scratch
//! files are owned by the run's future, so they are released whether the run
//! finishes, fails at any stage, or is cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::Utc;
use sg_av::{
    DurationProber, ScratchFile, ScratchSpace, ToolRegistry, TranscodeKind, TranscodeOutcome,
    Transcoder,
};
use sg_core::config::{Config, MediaConfig};
use sg_core::{Container, ProbeResult};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::artifact::{to_slash, IngestWarning, StoredArtifact};
use crate::naming::{canonicalize, CanonicalName};
use crate::request::{Lyrics, UploadRequest, UploadSource};
use crate::state::{Stage, StateMachine, StateObserver};
use crate::store::{FsMediaStore, MediaStore};

/// A failed run: the error and the last stage reached.
#[derive(Debug, thiserror::Error)]
#[error("ingest failed at {stage}: {error}")]
pub struct IngestFailure {
    pub stage: Stage,
    #[source]
    pub error: sg_core::Error,
}

impl IngestFailure {
    pub fn http_status(&self) -> u16 {
        self.error.http_status()
    }
}

/// Runs uploads through probing, transcoding, naming and storage.
pub struct IngestPipeline {
    scratch: ScratchSpace,
    prober: DurationProber,
    transcoder: Transcoder,
    store: Arc<dyn MediaStore>,
    audio_subdir: PathBuf,
    media_url: String,
    observer: Arc<StateObserver>,
}

impl IngestPipeline {
    pub fn new(
        scratch: ScratchSpace,
        prober: DurationProber,
        transcoder: Transcoder,
        store: Arc<dyn MediaStore>,
        media: &MediaConfig,
    ) -> Self {
        Self {
            scratch,
            prober,
            transcoder,
            store,
            audio_subdir: media.audio_subdir.clone(),
            media_url: media.media_url.clone(),
            observer: Arc::new(StateObserver::noop()),
        }
    }

    /// Build a pipeline storing into a [`FsMediaStore`] at `media.root`.
    pub fn from_config(config: &Config, tools: &ToolRegistry) -> sg_core::Result<Self> {
        let scratch = ScratchSpace::from_config(&config.scratch)?;
        let store = Arc::new(FsMediaStore::new(&config.media.root));
        let prober = DurationProber::new(tools, &config.probe);
        let transcoder = Transcoder::new(tools, &config.transcode);

        if !prober.has_tool() {
            tracing::warn!("ffprobe unavailable; durations will be estimated");
        }
        if !transcoder.has_tool() {
            tracing::warn!("ffmpeg unavailable; uploads will be stored in their original container");
        }

        Ok(Self::new(scratch, prober, transcoder, store, &config.media))
    }

    /// Builder: report every state transition to `observer`.
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Ingest one upload.
    pub async fn ingest(&self, request: UploadRequest) -> Result<StoredArtifact, IngestFailure> {
        self.ingest_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Ingest one upload, aborting with [`sg_core::Error::Cancelled`] when
    /// `cancel` fires before the commit starts. Once the artifact is being
    /// written the run is no longer cancellable and finishes normally.
    /// Scratch files are released before this returns either way.
    pub async fn ingest_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredArtifact, IngestFailure> {
        let ingest_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "ingest",
            %ingest_id,
            artist = %request.artist,
            title = %request.title,
        );

        let mut machine = StateMachine::new(&self.observer);

        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(sg_core::Error::Cancelled),
            r = self.prepare(request, &mut machine).instrument(span.clone()) => r,
        };

        let result = match prepared {
            // Last point at which a cancel can still leave the store untouched.
            Ok(_) if cancel.is_cancelled() => Err(sg_core::Error::Cancelled),
            Ok(prepared) => {
                self.commit(prepared, ingest_id, &mut machine)
                    .instrument(span.clone())
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(artifact) => Ok(artifact),
            Err(error) => {
                let stage = machine.fail();
                span.in_scope(|| tracing::warn!("failed after {stage}: {error}"));
                Err(IngestFailure { stage, error })
            }
        }
    }

    /// Received through Named: everything that happens before the store is touched.
    async fn prepare(
        &self,
        request: UploadRequest,
        machine: &mut StateMachine<'_>,
    ) -> sg_core::Result<Prepared> {
        let source = request
            .declared_container()
            .ok_or_else(|| sg_core::Error::missing("declared file extension"))?;
        let name = canonicalize(&request.artist, &request.title)?;
        tracing::info!("received {source} upload for {}", name.display());

        let input = self.stage_input(&request.source, &source).await?;
        let byte_size = input.byte_size().await;

        let duration = self.prober.probe(input.path(), byte_size).await;
        machine.advance(Stage::Probed);

        let outcome = self.transcoder.transcode(&self.scratch, &input, &source).await?;
        input.release();
        machine.advance(Stage::Transcoded);

        let container = outcome.container();
        let relative_path = self.audio_subdir.join(name.file_name(&container));
        let mut warnings = Vec::new();
        if let TranscodeOutcome::PassthroughOriginal { reason, .. } = &outcome {
            warnings.push(IngestWarning::ContainerMismatch {
                expected: Container::CANONICAL,
                actual: container.clone(),
                reason: reason.clone(),
            });
        }
        tracing::info!("named {}", relative_path.display());
        machine.advance(Stage::Named);

        Ok(Prepared {
            name,
            relative_path,
            container,
            duration,
            transcode: outcome.kind(),
            bytes: outcome.into_bytes(),
            warnings,
            lyrics: request.lyrics,
        })
    }

    /// Committed through Done.
    async fn commit(
        &self,
        prepared: Prepared,
        ingest_id: Uuid,
        machine: &mut StateMachine<'_>,
    ) -> sg_core::Result<StoredArtifact> {
        let Prepared {
            name,
            relative_path,
            container,
            duration,
            transcode,
            bytes,
            mut warnings,
            lyrics,
        } = prepared;

        let size = bytes.len() as u64;
        let started = SystemTime::now();
        self.store.commit(&relative_path, bytes).await?;
        self.remove_stale_siblings(&name, &container, started).await;
        machine.advance(Stage::Committed);

        let lyrics_path = match &lyrics {
            Some(lyrics) if !lyrics.text.trim().is_empty() => {
                let path = self
                    .audio_subdir
                    .join(name.with_extension(lyrics.format.extension()));
                match self.commit_sidecar(&path, &lyrics.text).await {
                    Ok(()) => Some(path),
                    Err(e) => {
                        tracing::warn!("lyrics for {} not stored: {e}", name.display());
                        warnings.push(IngestWarning::LyricsNotStored {
                            reason: e.to_string(),
                        });
                        None
                    }
                }
            }
            _ => None,
        };
        machine.advance(Stage::Done);

        tracing::info!(
            "stored {} ({size} bytes, {duration}, {} warning(s))",
            relative_path.display(),
            warnings.len()
        );

        Ok(StoredArtifact {
            ingest_id,
            url: self.url_for(&relative_path),
            relative_path,
            display_name: name.display().to_string(),
            container,
            duration,
            size,
            transcode,
            lyrics_path,
            warnings,
            committed_at: Utc::now(),
        })
    }

    /// Drop artifacts of the same song stored under another container by an
    /// earlier run. Files written after `cutoff` belong to a concurrent run
    /// and are left alone. Failures are logged only.
    async fn remove_stale_siblings(&self, name: &CanonicalName, kept: &Container, cutoff: SystemTime) {
        for container in Container::KNOWN.iter().filter(|c| *c != kept) {
            let sibling = self.audio_subdir.join(name.file_name(container));
            match self.store.remove_stale(&sibling, cutoff).await {
                Ok(true) => tracing::info!("removed superseded {}", sibling.display()),
                Ok(false) => {}
                Err(e) => tracing::warn!("could not remove superseded {}: {e}", sibling.display()),
            }
        }
    }

    /// Get the upload onto disk as a scratch file.
    async fn stage_input(
        &self,
        source: &UploadSource,
        container: &Container,
    ) -> sg_core::Result<ScratchFile> {
        match source {
            UploadSource::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(sg_core::Error::missing("audio bytes"));
                }
                let suffix = format!(".{}", container.extension());
                self.scratch.acquire_with(&suffix, bytes).await
            }
            UploadSource::File(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(ScratchFile::adopt(path)),
                Ok(_) => Err(sg_core::Error::missing(format!(
                    "audio bytes ({} is empty)",
                    path.display()
                ))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                    sg_core::Error::missing(format!("audio file {}", path.display())),
                ),
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn commit_sidecar(&self, relative: &Path, text: &str) -> sg_core::Result<()> {
        self.store
            .commit(relative, Bytes::copy_from_slice(text.as_bytes()))
            .await
    }

    fn url_for(&self, relative: &Path) -> String {
        let prefix = self.media_url.trim_end_matches('/');
        format!("{prefix}/{}", to_slash(relative))
    }
}

/// Output of the cancellable part of a run, ready to commit.
struct Prepared {
    name: CanonicalName,
    relative_path: PathBuf,
    container: Container,
    duration: ProbeResult,
    transcode: TranscodeKind,
    bytes: Bytes,
    warnings: Vec<IngestWarning>,
    lyrics: Option<Lyrics>,
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("scratch", &self.scratch)
            .field("audio_subdir", &self.audio_subdir)
            .field("media_url", &self.media_url)
            .finish_non_exhaustive()
    }
}

/// Canonical name for a request, as the pipeline would store it.
///
/// Lets callers find an artifact without ingesting.
pub fn canonical_name_for(request: &UploadRequest) -> sg_core::Result<CanonicalName> {
    canonicalize(&request.artist, &request.title)
}
