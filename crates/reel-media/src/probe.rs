//! FFprobe duration queries.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Default bound on a single probe invocation.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Probe the container-level duration of an audio or video file.
///
/// Missing and zero-byte files are rejected before FFprobe is spawned.
/// A zero or negative duration is returned as-is; callers decide whether
/// that makes the file unusable.
pub async fn probe_duration(path: impl AsRef<Path>, timeout_secs: u64) -> MediaResult<f64> {
    let path = path.as_ref();

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(MediaError::EmptyFile(path.to_path_buf()));
    }

    check_ffprobe()?;

    debug!(path = %path.display(), "Probing duration");

    let probe = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), probe)
        .await
        .map_err(|_| MediaError::Timeout(timeout_secs))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::probe_failed(path, stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_duration_output(&stdout).ok_or_else(|| {
        MediaError::probe_failed(path, format!("unparseable duration output: {:?}", stdout.trim()))
    })
}

/// Parse FFprobe's bare duration output (a single number on the first line).
pub fn parse_duration_output(output: &str) -> Option<f64> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let value: f64 = line.parse().ok()?;
    value.is_finite().then_some(value)
}
