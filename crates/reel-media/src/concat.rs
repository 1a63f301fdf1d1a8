//! Join ordered clips into one file with the concat demuxer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use reel_models::EncodingConfig;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{copy_file, is_valid_clip, write_concat_list};
use crate::tool::MediaTool;

/// Name of the list file written next to the output.
pub const CONCAT_LIST_FILE: &str = "concat_list.txt";

/// How clips are joined.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConcatMode {
    /// Stream copy; clips must share codec parameters.
    #[default]
    StreamCopy,
    /// Re-encode every clip so boundaries are consistent.
    Reencode(EncodingConfig),
}

/// Outcome of a concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct Concatenation {
    pub path: PathBuf,
    /// Number of valid clips that went into the output
    pub segment_count: usize,
    /// Joining failed and the only valid clip was copied instead
    pub single_copy_fallback: bool,
}

/// Concatenates clips into `output_dir`.
#[derive(Clone)]
pub struct SegmentConcatenator {
    tool: Arc<dyn MediaTool>,
    output_dir: PathBuf,
    list_dir: Option<PathBuf>,
    mode: ConcatMode,
    timeout_secs: u64,
}

impl SegmentConcatenator {
    pub fn new(tool: Arc<dyn MediaTool>, output_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            tool,
            output_dir: output_dir.into(),
            list_dir: None,
            mode: ConcatMode::StreamCopy,
            timeout_secs,
        }
    }

    pub fn with_mode(mut self, mode: ConcatMode) -> Self {
        self.mode = mode;
        self
    }

    /// Write the list file somewhere other than the output directory.
    pub fn with_list_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.list_dir = Some(dir.into());
        self
    }

    pub fn list_path(&self) -> PathBuf {
        self.list_dir
            .as_ref()
            .unwrap_or(&self.output_dir)
            .join(CONCAT_LIST_FILE)
    }

    fn build_command(&self, list_path: &Path, output: &Path) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(list_path, output).concat_list();
        match &self.mode {
            ConcatMode::StreamCopy => cmd.codec_copy(),
            ConcatMode::Reencode(encoding) => cmd.video_encoding(encoding).output_arg("-an"),
        }
    }

    /// Join `clips` in order into `<output_dir>/<output_name>`.
    ///
    /// Missing and zero-byte clips are skipped. If joining fails and exactly
    /// one valid clip exists, that clip is copied to the output instead.
    pub async fn concatenate(&self, clips: &[PathBuf], output_name: &str) -> MediaResult<Concatenation> {
        let mut valid = Vec::with_capacity(clips.len());
        for clip in clips {
            if is_valid_clip(clip).await {
                valid.push(clip.clone());
            } else {
                warn!(path = %clip.display(), "Skipping missing or empty segment");
            }
        }

        if valid.is_empty() {
            return Err(MediaError::NoValidSegments);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(output_name);
        let list_path = self.list_path();
        write_concat_list(&list_path, &valid).await?;

        let cmd = self.build_command(&list_path, &output);
        match self.tool.encode(&cmd, self.timeout_secs).await {
            Ok(()) => {
                info!(
                    output = %output.display(),
                    segments = valid.len(),
                    "Concatenated segments"
                );
                Ok(Concatenation {
                    path: output,
                    segment_count: valid.len(),
                    single_copy_fallback: false,
                })
            }
            Err(e) if valid.len() == 1 => {
                warn!(
                    error = %e,
                    source = %valid[0].display(),
                    "Concatenation failed, copying the single segment instead"
                );
                copy_file(&valid[0], &output).await?;
                Ok(Concatenation {
                    path: output,
                    segment_count: 1,
                    single_copy_fallback: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}
