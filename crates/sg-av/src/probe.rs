//! Playback duration probing with layered fallbacks.
//!
//! The [`DurationProber`] asks `ffprobe` for the container duration. When the
//! tool is missing, slow, failing, or prints something unparseable, the
//! duration is estimated from the byte size, and when that is unavailable too
//! a fixed default is reported. Probing never fails; the returned
//! [`ProbeResult`] says which tier produced the value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sg_core::config::ProbeConfig;
use sg_core::ProbeResult;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Measures playback length of audio files.
#[derive(Debug, Clone)]
pub struct DurationProber {
    ffprobe: Option<PathBuf>,
    timeout: Duration,
    bytes_per_second: u64,
    default_secs: u32,
}

impl DurationProber {
    /// Build a prober from the discovered tools and probe settings.
    pub fn new(tools: &ToolRegistry, config: &ProbeConfig) -> Self {
        Self {
            ffprobe: tools.path("ffprobe").map(Path::to_path_buf),
            timeout: config.timeout(),
            bytes_per_second: config.bytes_per_second,
            default_secs: config.default_duration_secs,
        }
    }

    /// Whether the probe tool is available at all.
    pub fn has_tool(&self) -> bool {
        self.ffprobe.is_some()
    }

    /// Probe `path`, falling back to a size estimate and then the default.
    ///
    /// `byte_size` is the size of the upload as known to the caller; `None`
    /// means it is unknown and the estimate tier is skipped.
    pub async fn probe(&self, path: &Path, byte_size: Option<u64>) -> ProbeResult {
        match self.measure(path).await {
            Ok(secs) => {
                let result = ProbeResult::measured(secs);
                tracing::info!("detected duration {result} for {}", path.display());
                return result;
            }
            Err(e) => {
                tracing::warn!("duration probe failed for {}: {e}", path.display());
            }
        }

        let result = self.fallback(byte_size);
        tracing::warn!("using fallback duration {result} for {}", path.display());
        result
    }

    /// Run the probe tool and parse its output.
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Tool`] when ffprobe is missing, fails or times out;
    /// [`sg_core::Error::Probe`] when its output is not a duration.
    pub async fn measure(&self, path: &Path) -> sg_core::Result<u32> {
        let ffprobe = self
            .ffprobe
            .as_ref()
            .ok_or_else(|| sg_core::Error::tool("ffprobe", "not available"))?;

        let mut cmd = ToolCommand::new(ffprobe);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]);
        cmd.arg(path);
        cmd.timeout(self.timeout);

        let output = cmd.execute().await?;
        parse_duration(&output.stdout)
    }

    /// Size-based estimate, or the fixed default.
    pub fn fallback(&self, byte_size: Option<u64>) -> ProbeResult {
        let estimate = byte_size
            .filter(|_| self.bytes_per_second > 0)
            .map(|size| size / self.bytes_per_second)
            .filter(|&secs| secs > 0);

        match estimate {
            Some(secs) => ProbeResult::estimated(u32::try_from(secs).unwrap_or(u32::MAX)),
            None => ProbeResult::default_for(self.default_secs),
        }
    }
}

/// Parse ffprobe's bare `format=duration` output into whole seconds.
///
/// The first non-empty line must be a finite, non-negative number; the
/// fractional part is truncated.
pub fn parse_duration(stdout: &str) -> sg_core::Result<u32> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| sg_core::Error::Probe("empty output".into()))?;

    let secs: f64 = line
        .parse()
        .map_err(|_| sg_core::Error::Probe(format!("not a number: {line}")))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(sg_core::Error::Probe(format!("not a valid duration: {line}")));
    }

    // `as` saturates for out-of-range floats.
    Ok(secs.trunc() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_core::Confidence;

    fn prober_without_tool() -> DurationProber {
        DurationProber::new(&ToolRegistry::empty(), &ProbeConfig::default())
    }

    #[test]
    fn parse_truncates_fraction() {
        assert_eq!(parse_duration("3.2\n").unwrap(), 3);
        assert_eq!(parse_duration("180.999").unwrap(), 180);
        assert_eq!(parse_duration("\n  245.000000\n").unwrap(), 245);
        assert_eq!(parse_duration("0.4").unwrap(), 0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   \n").is_err());
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1.5").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("NaN").is_err());
    }

    #[tokio::test]
    async fn missing_tool_estimates_from_size() {
        let prober = prober_without_tool();
        assert!(!prober.has_tool());

        let result = prober
            .probe(Path::new("/nonexistent/song.mp3"), Some(4_000_000))
            .await;
        assert_eq!(result.seconds(), 100);
        assert_eq!(result.confidence(), Confidence::Estimated);
    }

    #[tokio::test]
    async fn missing_tool_and_size_uses_default() {
        let prober = prober_without_tool();
        let result = prober.probe(Path::new("/nonexistent/song.mp3"), None).await;
        assert_eq!(result.seconds(), 180);
        assert_eq!(result.confidence(), Confidence::Default);
    }

    #[test]
    fn tiny_file_estimate_falls_to_default() {
        let prober = prober_without_tool();
        let result = prober.fallback(Some(39_999));
        assert_eq!(result.seconds(), 180);
        assert_eq!(result.confidence(), Confidence::Default);
    }

    #[test]
    fn zero_divisor_disables_estimate() {
        let config = ProbeConfig {
            bytes_per_second: 0,
            default_duration_secs: 90,
            ..ProbeConfig::default()
        };
        let prober = DurationProber::new(&ToolRegistry::empty(), &config);
        assert_eq!(prober.fallback(Some(10_000_000)), ProbeResult::default_for(90));
    }

    #[test]
    fn zero_default_is_clamped() {
        let config = ProbeConfig {
            default_duration_secs: 0,
            ..ProbeConfig::default()
        };
        let prober = DurationProber::new(&ToolRegistry::empty(), &config);
        assert_eq!(prober.fallback(None).seconds(), 1);
    }

    #[cfg(unix)]
    mod with_fake_ffprobe {
        use super::*;
        use crate::test_util::fake_tool;
        use serial_test::serial;

        fn prober(script: &Path, timeout: Duration) -> DurationProber {
            let tools = ToolRegistry::empty().with_tool("ffprobe", script);
            let mut prober = DurationProber::new(&tools, &ProbeConfig::default());
            prober.timeout = timeout;
            prober
        }

        #[tokio::test]
        #[serial]
        async fn measured_duration_is_truncated() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_tool(dir.path(), "ffprobe", "echo 3.2");
            let result = prober(&script, Duration::from_secs(10))
                .probe(Path::new("/tmp/in.wav"), Some(4_000_000))
                .await;
            assert_eq!(result, ProbeResult::measured(3));
        }

        #[tokio::test]
        #[serial]
        async fn sub_second_measurement_is_clamped() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_tool(dir.path(), "ffprobe", "echo 0.4");
            let result = prober(&script, Duration::from_secs(10))
                .probe(Path::new("/tmp/in.wav"), None)
                .await;
            assert_eq!(result.seconds(), 1);
            assert_eq!(result.confidence(), Confidence::Measured);
        }

        #[tokio::test]
        #[serial]
        async fn unparseable_output_falls_back() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_tool(dir.path(), "ffprobe", "echo N/A");
            let result = prober(&script, Duration::from_secs(10))
                .probe(Path::new("/tmp/in.wav"), Some(4_000_000))
                .await;
            assert_eq!(result, ProbeResult::estimated(100));
        }

        #[tokio::test]
        #[serial]
        async fn non_zero_exit_falls_back() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_tool(dir.path(), "ffprobe", "echo 12.0; exit 1");
            let result = prober(&script, Duration::from_secs(10))
                .probe(Path::new("/tmp/in.wav"), None)
                .await;
            assert_eq!(result, ProbeResult::default_for(180));
        }

        #[tokio::test]
        #[serial]
        async fn slow_tool_times_out_and_falls_back() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_tool(dir.path(), "ffprobe", "sleep 5; echo 12.0");
            let result = prober(&script, Duration::from_millis(200))
                .probe(Path::new("/tmp/in.wav"), Some(800_000))
                .await;
            assert_eq!(result, ProbeResult::estimated(20));
        }
    }
}
