//! Deterministic artifact naming from artist and title.

use serde::{Deserialize, Serialize};
use sg_core::Container;

/// Longest physical stem in bytes; leaves room for an extension within the
/// common 255-byte file name limit.
const MAX_STEM_BYTES: usize = 200;

/// The canonical name of an artifact, in physical and display forms.
///
/// `display` is `"Artist - Title"`; `stem` is the same text with spaces
/// replaced by underscores and is what appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalName {
    stem: String,
    display: String,
}

impl CanonicalName {
    /// Physical file stem, e.g. `Daft_Punk_-_One_More_Time`.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Human-readable form, e.g. `Daft Punk - One More Time`.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// File name for an artifact in `container`.
    pub fn file_name(&self, container: &Container) -> String {
        self.with_extension(container.extension())
    }

    /// File name for a sidecar with the given extension.
    pub fn with_extension(&self, ext: &str) -> String {
        format!("{}.{ext}", self.stem)
    }
}

/// Derive the canonical name for `(artist, title)`.
///
/// `/` and `\` become `_`, `"` and control characters are dropped, and runs
/// of whitespace collapse to a single separator (a space in the display form,
/// `_` in the stem).
///
/// # Errors
///
/// [`sg_core::Error::MissingInput`] when the artist or title is empty after
/// sanitization.
pub fn canonicalize(artist: &str, title: &str) -> sg_core::Result<CanonicalName> {
    let artist = sanitize(artist);
    if artist.is_empty() {
        return Err(sg_core::Error::missing("artist"));
    }
    let title = sanitize(title);
    if title.is_empty() {
        return Err(sg_core::Error::missing("title"));
    }

    let display = format!("{artist} - {title}");
    let stem = truncate_at_char_boundary(&display.replace(' ', "_"), MAX_STEM_BYTES);

    Ok(CanonicalName { stem, display })
}

fn sanitize(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' => Some('_'),
            '"' => None,
            c if c.is_whitespace() => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_at_char_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
