//! Media-domain types: audio containers and probe results.
//!
//! Enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Audio container formats, identified by file extension.
///
/// [`Container::M4a`] is the canonical container every stored artifact is
/// normalized to. Extensions the pipeline has no special knowledge of are kept
/// as [`Container::Other`] so a passthrough artifact can still be stored under
/// its true extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Container {
    M4a,
    Mp3,
    Wav,
    Flac,
    Ogg,
    Aac,
    Other(String),
}

impl Container {
    /// The canonical storage container.
    pub const CANONICAL: Container = Container::M4a;

    /// Containers with a dedicated variant.
    pub const KNOWN: &'static [Container] = &[
        Container::M4a,
        Container::Mp3,
        Container::Wav,
        Container::Flac,
        Container::Ogg,
        Container::Aac,
    ];

    /// Parse a declared extension such as `"mp3"`, `".MP3"` or `" .wav "`.
    ///
    /// Returns `None` when nothing usable remains after normalization. Only
    /// ASCII alphanumerics survive, so the result is always safe to splice
    /// into a file name.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let normalized: String = ext
            .trim()
            .trim_start_matches('.')
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let container = match normalized.as_str() {
            "" => return None,
            "m4a" => Self::M4a,
            "mp3" => Self::Mp3,
            "wav" | "wave" => Self::Wav,
            "flac" => Self::Flac,
            "ogg" | "oga" => Self::Ogg,
            "aac" => Self::Aac,
            _ => Self::Other(normalized),
        };
        Some(container)
    }

    /// Parse the extension of a file name or path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// File extension (without the leading dot).
    pub fn extension(&self) -> &str {
        match self {
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::Other(ext) => ext,
        }
    }

    /// Whether this is the canonical storage container.
    pub fn is_canonical(&self) -> bool {
        *self == Self::CANONICAL
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("invalid container extension: {s:?}"))
    }
}

impl From<Container> for String {
    fn from(c: Container) -> Self {
        c.extension().to_string()
    }
}

impl TryFrom<String> for Container {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// Probe results
// ---------------------------------------------------------------------------

/// How a duration value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The probe tool succeeded and returned a parseable value.
    Measured,
    /// Derived from the byte size with a constant-bitrate heuristic.
    Estimated,
    /// Fixed fallback; neither the tool nor the byte size was usable.
    Default,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured => write!(f, "measured"),
            Self::Estimated => write!(f, "estimated"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A playback duration in whole seconds, tagged with its [`Confidence`].
///
/// The seconds value is never zero; construction clamps it to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProbeResult")]
pub struct ProbeResult {
    seconds: u32,
    confidence: Confidence,
}

/// Wire form of [`ProbeResult`]; deserialized values go through the clamp.
#[derive(Deserialize)]
struct RawProbeResult {
    seconds: u32,
    confidence: Confidence,
}

impl From<RawProbeResult> for ProbeResult {
    fn from(raw: RawProbeResult) -> Self {
        Self::new(raw.seconds, raw.confidence)
    }
}

impl ProbeResult {
    /// Build a result, clamping `seconds` to a minimum of 1.
    pub fn new(seconds: u32, confidence: Confidence) -> Self {
        Self {
            seconds: seconds.max(1),
            confidence,
        }
    }

    pub fn measured(seconds: u32) -> Self {
        Self::new(seconds, Confidence::Measured)
    }

    pub fn estimated(seconds: u32) -> Self {
        Self::new(seconds, Confidence::Estimated)
    }

    pub fn default_for(seconds: u32) -> Self {
        Self::new(seconds, Confidence::Default)
    }

    /// Duration in whole seconds (always >= 1).
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Whether a later re-probe could improve this value.
    pub fn is_approximate(&self) -> bool {
        self.confidence != Confidence::Measured
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.seconds / 60;
        let s = self.seconds % 60;
        write!(f, "{m}:{s:02} ({})", self.confidence)
    }
}
