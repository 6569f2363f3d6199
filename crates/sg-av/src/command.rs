//! Running ffmpeg/ffprobe as bounded child processes.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;

/// Used when the caller sets no timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How many trailing stderr lines an error message keeps.
const STDERR_TAIL_LINES: usize = 4;

/// What a finished tool run produced.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Wall time from spawn to exit.
    pub elapsed: Duration,
}

/// One external tool invocation: program, arguments and a deadline.
///
/// Arguments are kept as OS strings so file paths reach the tool unchanged.
/// The child is spawned with `kill_on_drop`; hitting the deadline or dropping
/// the [`execute`](Self::execute) future kills it.
///
/// ```no_run
/// use sg_av::ToolCommand;
/// use std::path::Path;
/// use std::time::Duration;
///
/// # async fn example() -> sg_core::Result<()> {
/// let output = ToolCommand::new("ffprobe")
///     .args(["-v", "error", "-show_entries", "format=duration"])
///     .arg(Path::new("/uploads/song.mp3"))
///     .timeout(Duration::from_secs(30))
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// File name of the program, e.g. `ffprobe` for `/usr/bin/ffprobe`.
    pub fn program_name(&self) -> String {
        match self.program.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.program.to_string_lossy().into_owned(),
        }
    }

    /// Run to completion and capture output.
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Tool`] when the program cannot be spawned, exits
    /// non-zero (the message ends with the tail of its stderr), or is still
    /// running when the timeout elapses.
    pub async fn execute(&self) -> sg_core::Result<ToolOutput> {
        let name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %name, args = ?self.args, timeout = ?self.timeout, "running");

        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| sg_core::Error::tool(&name, format!("failed to spawn: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(sg_core::Error::tool(name, format!("wait failed: {e}")));
            }
            // The elapsed wait future owned the child; dropping it killed the process.
            Err(_) => {
                return Err(sg_core::Error::tool(
                    name,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        let result = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started.elapsed(),
        };
        tracing::debug!(tool = %name, status = %result.status, elapsed = ?result.elapsed, "finished");

        if !result.status.success() {
            return Err(sg_core::Error::tool(
                name,
                format!(
                    "exited with {}: {}",
                    result.status,
                    stderr_tail(&result.stderr, STDERR_TAIL_LINES)
                ),
            ));
        }

        Ok(result)
    }
}

/// The last `lines` non-blank lines of `stderr`, joined with ` | `.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    kept[kept.len().saturating_sub(lines)..].join(" | ")
}
