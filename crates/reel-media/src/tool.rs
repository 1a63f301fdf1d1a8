//! The external media tool boundary.
//!
//! Every media component talks to FFmpeg/FFprobe only through [`MediaTool`],
//! so a pipeline can be driven by a scripted fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_duration, DEFAULT_PROBE_TIMEOUT_SECS};

/// Narrow interface over the inspection and encoding tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Playable duration of an audio or video file in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Run one encode. Success means exit code 0 and a non-empty output file.
    async fn encode(&self, command: &FfmpegCommand, timeout_secs: u64) -> MediaResult<()>;
}

/// Wall-clock bounds for each kind of external invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTimeouts {
    pub probe_secs: u64,
    pub render_secs: u64,
    pub concat_secs: u64,
    pub merge_secs: u64,
    pub transition_secs: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            probe_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            render_secs: 60,
            concat_secs: 120,
            merge_secs: 120,
            transition_secs: 120,
        }
    }
}

/// Production [`MediaTool`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    probe_timeout_secs: u64,
}

impl FfmpegTool {
    pub fn new(probe_timeout_secs: u64) -> Self {
        Self { probe_timeout_secs }
    }

    /// Verify both binaries are on PATH.
    pub fn check_available(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT_SECS)
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        probe_duration(path, self.probe_timeout_secs).await
    }

    async fn encode(&self, command: &FfmpegCommand, timeout_secs: u64) -> MediaResult<()> {
        FfmpegRunner::new().with_timeout(timeout_secs).run(command).await
    }
}
