//! Re-encoding uploads into the canonical audio container.
//!
//! The [`Transcoder`] shells out to ffmpeg to produce a single-stream AAC
//! `.m4a`. Encoding failures never abort ingestion: the original bytes are
//! returned instead, tagged with the container they are actually in, so the
//! stored name and served format always match the bytes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sg_core::config::TranscodeConfig;
use sg_core::Container;

use crate::command::ToolCommand;
use crate::scratch::{ScratchFile, ScratchSpace};
use crate::tools::ToolRegistry;

/// What the transcoder handed back.
#[derive(Debug, Clone)]
pub enum TranscodeOutcome {
    /// ffmpeg produced canonical-container bytes.
    Converted { bytes: Bytes },
    /// The input was already in the canonical container; bytes are unchanged.
    AlreadyCanonical { bytes: Bytes },
    /// Encoding failed; these are the original bytes in their own container.
    PassthroughOriginal {
        bytes: Bytes,
        container: Container,
        reason: String,
    },
}

/// Serializable tag for a [`TranscodeOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeKind {
    Converted,
    AlreadyCanonical,
    Passthrough,
}

impl TranscodeOutcome {
    /// Container the returned bytes are actually in.
    pub fn container(&self) -> Container {
        match self {
            Self::Converted { .. } | Self::AlreadyCanonical { .. } => Container::CANONICAL,
            Self::PassthroughOriginal { container, .. } => container.clone(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Converted { bytes }
            | Self::AlreadyCanonical { bytes }
            | Self::PassthroughOriginal { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Converted { bytes }
            | Self::AlreadyCanonical { bytes }
            | Self::PassthroughOriginal { bytes, .. } => bytes,
        }
    }

    pub fn kind(&self) -> TranscodeKind {
        match self {
            Self::Converted { .. } => TranscodeKind::Converted,
            Self::AlreadyCanonical { .. } => TranscodeKind::AlreadyCanonical,
            Self::PassthroughOriginal { .. } => TranscodeKind::Passthrough,
        }
    }

    /// Whether encoding was attempted and failed.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::PassthroughOriginal { .. })
    }
}

/// Encodes audio into the canonical container via ffmpeg.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: Option<PathBuf>,
    timeout: Duration,
    codec: String,
    bitrate: String,
}

impl Transcoder {
    pub fn new(tools: &ToolRegistry, config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg: tools.path("ffmpeg").map(Path::to_path_buf),
            timeout: config.timeout(),
            codec: config.codec.clone(),
            bitrate: config.bitrate.clone(),
        }
    }

    /// Whether the encoder is available at all.
    pub fn has_tool(&self) -> bool {
        self.ffmpeg.is_some()
    }

    /// Bring `input` (declared as `source`) into the canonical container.
    ///
    /// Intermediate output lives in a scratch file from `scratch` that is
    /// released before this returns.
    ///
    /// # Errors
    ///
    /// Only when the input itself cannot be read; encoder problems degrade to
    /// [`TranscodeOutcome::PassthroughOriginal`].
    pub async fn transcode(
        &self,
        scratch: &ScratchSpace,
        input: &ScratchFile,
        source: &Container,
    ) -> sg_core::Result<TranscodeOutcome> {
        if source.is_canonical() {
            tracing::debug!("{} already {source}; skipping encode", input.path().display());
            let bytes = read_bytes(input.path()).await?;
            return Ok(TranscodeOutcome::AlreadyCanonical { bytes });
        }

        match self.encode(scratch, input).await {
            Ok(bytes) => {
                tracing::info!(
                    "converted {source} to {} ({} bytes)",
                    Container::CANONICAL,
                    bytes.len()
                );
                Ok(TranscodeOutcome::Converted { bytes })
            }
            Err(e) => {
                tracing::warn!(
                    "encode of {} failed, keeping original {source}: {e}",
                    input.path().display()
                );
                let bytes = read_bytes(input.path()).await?;
                Ok(TranscodeOutcome::PassthroughOriginal {
                    bytes,
                    container: source.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn encode(&self, scratch: &ScratchSpace, input: &ScratchFile) -> sg_core::Result<Bytes> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| sg_core::Error::tool("ffmpeg", "not available"))?;

        let suffix = format!(".{}", Container::CANONICAL.extension());
        let output = scratch.acquire(&suffix)?;

        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"]);
        cmd.arg(input.path());
        // Exactly one audio stream; drop cover art and anything else.
        cmd.args(["-vn", "-map", "0:a:0"]);
        cmd.args(["-c:a", self.codec.as_str(), "-b:a", self.bitrate.as_str()]);
        cmd.arg(output.path());
        cmd.timeout(self.timeout);
        cmd.execute().await?;

        let bytes = read_bytes(output.path()).await?;
        if bytes.is_empty() {
            return Err(sg_core::Error::tool("ffmpeg", "produced empty output"));
        }
        Ok(bytes)
    }
}

async fn read_bytes(path: &Path) -> sg_core::Result<Bytes> {
    Ok(Bytes::from(tokio::fs::read(path).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_count(space: &ScratchSpace) -> usize {
        std::fs::read_dir(space.root()).unwrap().count()
    }

    #[tokio::test]
    async fn canonical_input_passes_through_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(tmp.path()).unwrap();
        let input = space.acquire_with(".m4a", b"\0\0\0\x20ftypM4A ").await.unwrap();

        let transcoder = Transcoder::new(&ToolRegistry::empty(), &TranscodeConfig::default());
        let outcome = transcoder
            .transcode(&space, &input, &Container::M4a)
            .await
            .unwrap();

        assert_eq!(outcome.kind(), TranscodeKind::AlreadyCanonical);
        assert_eq!(outcome.container(), Container::M4a);
        assert_eq!(outcome.bytes().as_ref(), b"\0\0\0\x20ftypM4A ");
    }

    #[tokio::test]
    async fn missing_encoder_keeps_original_container() {
        let tmp = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(tmp.path()).unwrap();
        let input = space.acquire_with(".wav", b"RIFF....WAVE").await.unwrap();

        let transcoder = Transcoder::new(&ToolRegistry::empty(), &TranscodeConfig::default());
        assert!(!transcoder.has_tool());
        let outcome = transcoder
            .transcode(&space, &input, &Container::Wav)
            .await
            .unwrap();

        assert!(outcome.is_passthrough());
        assert_eq!(outcome.container(), Container::Wav);
        assert_eq!(outcome.bytes().as_ref(), b"RIFF....WAVE");
        match outcome {
            TranscodeOutcome::PassthroughOriginal { reason, .. } => {
                assert!(reason.contains("ffmpeg"), "{reason}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // Only the input remains.
        assert_eq!(scratch_count(&space), 1);
    }

    #[tokio::test]
    async fn unreadable_input_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(tmp.path()).unwrap();
        let input = ScratchFile::adopt(tmp.path().join("gone.mp3"));

        let transcoder = Transcoder::new(&ToolRegistry::empty(), &TranscodeConfig::default());
        let result = transcoder.transcode(&space, &input, &Container::Mp3).await;
        assert!(matches!(result, Err(sg_core::Error::Io { .. })));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TranscodeKind::AlreadyCanonical).unwrap();
        assert_eq!(json, "\"already_canonical\"");
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use crate::test_util::fake_tool;
        use serial_test::serial;

        // Writes a marker into the last argument, like ffmpeg writing its output.
        const WRITE_LAST_ARG: &str = r#"for last; do :; done; printf 'AAC-ENCODED' > "$last""#;

        fn transcoder(script: &Path, timeout: Duration) -> Transcoder {
            let tools = ToolRegistry::empty().with_tool("ffmpeg", script);
            let mut t = Transcoder::new(&tools, &TranscodeConfig::default());
            t.timeout = timeout;
            t
        }

        #[tokio::test]
        #[serial]
        async fn successful_encode_returns_canonical_bytes() {
            let bin = tempfile::tempdir().unwrap();
            let script = fake_tool(bin.path(), "ffmpeg", WRITE_LAST_ARG);
            let tmp = tempfile::tempdir().unwrap();
            let space = ScratchSpace::new(tmp.path()).unwrap();
            let input = space.acquire_with(".wav", b"RIFF....WAVE").await.unwrap();

            let outcome = transcoder(&script, Duration::from_secs(10))
                .transcode(&space, &input, &Container::Wav)
                .await
                .unwrap();

            assert_eq!(outcome.kind(), TranscodeKind::Converted);
            assert_eq!(outcome.container(), Container::M4a);
            assert_eq!(outcome.bytes().as_ref(), b"AAC-ENCODED");
            // The encoder's output scratch file is already gone.
            assert_eq!(scratch_count(&space), 1);
        }

        #[tokio::test]
        #[serial]
        async fn failing_encoder_passes_through() {
            let bin = tempfile::tempdir().unwrap();
            let script = fake_tool(bin.path(), "ffmpeg", "echo 'Invalid data' >&2; exit 1");
            let tmp = tempfile::tempdir().unwrap();
            let space = ScratchSpace::new(tmp.path()).unwrap();
            let input = space.acquire_with(".mp3", b"ID3garbage").await.unwrap();

            let outcome = transcoder(&script, Duration::from_secs(10))
                .transcode(&space, &input, &Container::Mp3)
                .await
                .unwrap();

            assert_eq!(outcome.container(), Container::Mp3);
            assert_eq!(outcome.bytes().as_ref(), b"ID3garbage");
            assert_eq!(scratch_count(&space), 1);
        }

        #[tokio::test]
        #[serial]
        async fn empty_output_counts_as_failure() {
            let bin = tempfile::tempdir().unwrap();
            let script = fake_tool(bin.path(), "ffmpeg", "exit 0");
            let tmp = tempfile::tempdir().unwrap();
            let space = ScratchSpace::new(tmp.path()).unwrap();
            let input = space.acquire_with(".flac", b"fLaC").await.unwrap();

            let outcome = transcoder(&script, Duration::from_secs(10))
                .transcode(&space, &input, &Container::Flac)
                .await
                .unwrap();

            assert!(outcome.is_passthrough());
            assert_eq!(outcome.container(), Container::Flac);
        }

        #[tokio::test]
        #[serial]
        async fn slow_encoder_times_out() {
            let bin = tempfile::tempdir().unwrap();
            let script = fake_tool(bin.path(), "ffmpeg", "sleep 5");
            let tmp = tempfile::tempdir().unwrap();
            let space = ScratchSpace::new(tmp.path()).unwrap();
            let input = space.acquire_with(".ogg", b"OggS").await.unwrap();

            let outcome = transcoder(&script, Duration::from_millis(200))
                .transcode(&space, &input, &Container::Ogg)
                .await
                .unwrap();

            match outcome {
                TranscodeOutcome::PassthroughOriginal { reason, container, .. } => {
                    assert_eq!(container, Container::Ogg);
                    assert!(reason.contains("timed out"), "{reason}");
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert_eq!(scratch_count(&space), 1);
        }
    }
}
