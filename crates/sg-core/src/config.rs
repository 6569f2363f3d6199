//! Application configuration types.
//!
//! The top-level [`Config`] struct carries all sub-configs for the media
//! store, scratch space, external tools, probing and transcoding. Every section
//! defaults sensibly so a completely empty file is valid. Parsing the file
//! format is left to the binary.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub scratch: ScratchConfig,
    pub tools: ToolsConfig,
    pub probe: ProbeConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.media.audio_subdir.is_absolute()
            || self
                .media
                .audio_subdir
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            warnings.push(format!(
                "media.audio_subdir '{}' escapes the media root",
                self.media.audio_subdir.display()
            ));
        }

        if !self.media.media_url.ends_with('/') {
            warnings.push(format!(
                "media.media_url '{}' should end with '/'",
                self.media.media_url
            ));
        }

        if self.probe.timeout_secs == 0 {
            warnings.push("probe.timeout_secs is 0; every probe will time out".into());
        }
        if self.probe.bytes_per_second == 0 {
            warnings.push(
                "probe.bytes_per_second is 0; size-based estimates are disabled".into(),
            );
        }
        if self.probe.default_duration_secs == 0 {
            warnings.push("probe.default_duration_secs is 0; 1 will be used instead".into());
        }

        if self.transcode.timeout_secs == 0 {
            warnings.push("transcode.timeout_secs is 0; every encode will time out".into());
        }
        if self.transcode.codec.trim().is_empty() {
            warnings.push("transcode.codec is empty".into());
        }

        if !self.tools.search_path
            && (self.tools.ffmpeg_path.is_none() || self.tools.ffprobe_path.is_none())
        {
            warnings.push(
                "tools.search_path is off and not every tool has an explicit path".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Durable media store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root directory of the media store.
    pub root: PathBuf,
    /// Subpath under `root` where audio artifacts live.
    pub audio_subdir: PathBuf,
    /// URL prefix the catalog serves `root` under.
    pub media_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media"),
            audio_subdir: PathBuf::from("songs/audio"),
            media_url: "/media/".into(),
        }
    }
}

/// Scratch space for per-run temporary files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Directory for scratch files; the system temp dir when unset.
    pub dir: Option<PathBuf>,
}

impl ScratchConfig {
    /// Resolved scratch directory.
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("songforged"))
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Fall back to searching `PATH` when no explicit path is usable.
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Explicit override for the named tool, if any.
    pub fn path_for(&self, name: &str) -> Option<&Path> {
        match name {
            "ffmpeg" => self.ffmpeg_path.as_deref(),
            "ffprobe" => self.ffprobe_path.as_deref(),
            _ => None,
        }
    }
}

/// Duration probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    /// Average bytes per second used for size-based estimates (~320 kbps).
    pub bytes_per_second: u64,
    /// Duration reported when neither the tool nor the byte size helps.
    pub default_duration_secs: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            bytes_per_second: 40_000,
            default_duration_secs: 180,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Encoding into the canonical container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub timeout_secs: u64,
    /// ffmpeg audio encoder name.
    pub codec: String,
    /// ffmpeg bitrate string, e.g. `192k`.
    pub bitrate: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            codec: "aac".into(),
            bitrate: "192k".into(),
        }
    }
}

impl TranscodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.media.audio_subdir, PathBuf::from("songs/audio"));
        assert_eq!(cfg.media.media_url, "/media/");
        assert_eq!(cfg.probe.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.probe.bytes_per_second, 40_000);
        assert_eq!(cfg.probe.default_duration_secs, 180);
        assert_eq!(cfg.transcode.timeout(), Duration::from_secs(300));
        assert_eq!(cfg.transcode.codec, "aac");
        assert_eq!(cfg.transcode.bitrate, "192k");
        assert!(cfg.tools.search_path);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [media]
            root = "/data/media"

            [probe]
            default_duration_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(cfg.media.root, PathBuf::from("/data/media"));
        assert_eq!(cfg.media.audio_subdir, PathBuf::from("songs/audio"));
        assert_eq!(cfg.probe.default_duration_secs, 120);
        assert_eq!(cfg.probe.timeout_secs, 30);
    }

    #[test]
    fn validate_flags_escaping_subdir() {
        let mut cfg = Config::default();
        cfg.media.audio_subdir = PathBuf::from("../outside");
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("escapes")), "{warnings:?}");
    }

    #[test]
    fn validate_flags_zero_values() {
        let mut cfg = Config::default();
        cfg.probe.timeout_secs = 0;
        cfg.probe.bytes_per_second = 0;
        cfg.transcode.timeout_secs = 0;
        assert_eq!(cfg.validate().len(), 3);
    }

    #[test]
    fn validate_flags_missing_tools_without_path_search() {
        let mut cfg = Config::default();
        cfg.tools.search_path = false;
        cfg.tools.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("search_path")));
    }

    #[test]
    fn scratch_dir_defaults_under_temp() {
        let cfg = ScratchConfig::default();
        assert!(cfg.dir().starts_with(std::env::temp_dir()));
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ScratchConfig {
            dir: Some(tmp.path().to_path_buf()),
        };
        assert_eq!(cfg.dir(), tmp.path());
    }

    #[test]
    fn tool_path_lookup() {
        let cfg = ToolsConfig {
            ffprobe_path: Some(PathBuf::from("/usr/local/bin/ffprobe")),
            ..ToolsConfig::default()
        };
        assert_eq!(
            cfg.path_for("ffprobe"),
            Some(Path::new("/usr/local/bin/ffprobe"))
        );
        assert_eq!(cfg.path_for("ffmpeg"), None);
        assert_eq!(cfg.path_for("mkvmerge"), None);
    }
}
