pub use sg_core::config::Config;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched when no `--config` is given, in order.
const DEFAULT_PATHS: &[&str] = &[
    "./songforged.toml",
    "~/.config/songforged/config.toml",
    "/etc/songforged/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {}", path.display(), warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    match find_config(custom_path) {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// The config file that would be loaded, if any.
pub fn find_config(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songforged.toml");
        std::fs::write(
            &path,
            "[media]\nroot = \"/srv/media\"\n\n[probe]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.media.root, PathBuf::from("/srv/media"));
        assert_eq!(config.media.audio_subdir, PathBuf::from("songs/audio"));
        assert_eq!(config.probe.timeout_secs, 5);
        assert_eq!(config.probe.default_duration_secs, 180);
        assert_eq!(config.transcode.bitrate, "192k");
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[media\nroot = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/songforged.toml")).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }
}
