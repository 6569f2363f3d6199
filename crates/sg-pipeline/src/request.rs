//! Caller-constructed ingestion requests.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sg_core::Container;

/// Where the uploaded audio comes from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// In-memory upload; the pipeline copies it into its own scratch file.
    Bytes(Bytes),
    /// A file the caller already has on disk. The pipeline reads it and
    /// leaves it in place.
    File(PathBuf),
}

/// Lyrics sidecar formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricsFormat {
    /// Timed lyrics text, as pasted into the upload form.
    Lrc,
    /// WebVTT cue file, as attached in the admin form.
    Vtt,
}

impl LyricsFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Lrc => "lrc",
            Self::Vtt => "vtt",
        }
    }
}

/// Lyrics stored next to the audio artifact under the same canonical stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lyrics {
    pub format: LyricsFormat,
    pub text: String,
}

impl Lyrics {
    pub fn lrc(text: impl Into<String>) -> Self {
        Self {
            format: LyricsFormat::Lrc,
            text: text.into(),
        }
    }

    pub fn vtt(text: impl Into<String>) -> Self {
        Self {
            format: LyricsFormat::Vtt,
            text: text.into(),
        }
    }
}

/// One upload to ingest.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    pub artist: String,
    pub title: String,
    /// Extension the upload was declared with, e.g. `"mp3"` or `".wav"`.
    pub extension: String,
    pub lyrics: Option<Lyrics>,
}

impl UploadRequest {
    pub fn new(
        source: UploadSource,
        artist: impl Into<String>,
        title: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            source,
            artist: artist.into(),
            title: title.into(),
            extension: extension.into(),
            lyrics: None,
        }
    }

    /// In-memory upload whose extension is taken from its original file name.
    pub fn from_bytes(
        bytes: impl Into<Bytes>,
        file_name: &str,
        artist: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::new(
            UploadSource::Bytes(bytes.into()),
            artist,
            title,
            extension_of(Path::new(file_name)),
        )
    }

    /// Caller-owned file on disk.
    pub fn from_file(
        path: impl Into<PathBuf>,
        artist: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        Self::new(UploadSource::File(path), artist, title, extension)
    }

    /// Builder: attach a lyrics sidecar.
    pub fn with_lyrics(mut self, lyrics: Lyrics) -> Self {
        self.lyrics = Some(lyrics);
        self
    }

    /// Container implied by the declared extension.
    pub fn declared_container(&self) -> Option<Container> {
        Container::from_extension(&self.extension)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_takes_extension_from_file_name() {
        let req = UploadRequest::from_bytes(&b"ID3"[..], "My Song.MP3", "A", "T");
        assert_eq!(req.extension, "MP3");
        assert_eq!(req.declared_container(), Some(Container::Mp3));
        assert!(req.lyrics.is_none());
    }

    #[test]
    fn from_file_records_path() {
        let req = UploadRequest::from_file("/uploads/take1.wav", "A", "T");
        assert!(matches!(req.source, UploadSource::File(ref p) if p == Path::new("/uploads/take1.wav")));
        assert_eq!(req.declared_container(), Some(Container::Wav));
    }

    #[test]
    fn missing_extension_has_no_container() {
        let req = UploadRequest::from_bytes(&b"data"[..], "noext", "A", "T");
        assert_eq!(req.extension, "");
        assert_eq!(req.declared_container(), None);
    }

    #[test]
    fn with_lyrics_attaches_sidecar() {
        let req = UploadRequest::from_bytes(&b"x"[..], "a.flac", "A", "T")
            .with_lyrics(Lyrics::lrc("[00:01.00] hello"));
        let lyrics = req.lyrics.unwrap();
        assert_eq!(lyrics.format, LyricsFormat::Lrc);
        assert_eq!(lyrics.format.extension(), "lrc");
        assert_eq!(Lyrics::vtt("WEBVTT").format.extension(), "vtt");
    }
}
