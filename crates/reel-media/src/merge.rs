//! Attach an audio track to a video using the shortest-stream rule.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use reel_models::encoding::{DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_non_empty;
use crate::tool::MediaTool;

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedVideo {
    pub path: PathBuf,
    /// `min(video, audio)` duration
    pub duration_seconds: f64,
}

/// Maps video from the first input and audio from the second, copying the
/// video stream and re-encoding audio to AAC.
///
/// The output always stops at the shorter stream. Callers that need the
/// full audio length must loop the video first.
#[derive(Clone)]
pub struct AudioVideoMerger {
    tool: Arc<dyn MediaTool>,
    audio_bitrate: String,
    timeout_secs: u64,
}

impl AudioVideoMerger {
    pub fn new(tool: Arc<dyn MediaTool>, timeout_secs: u64) -> Self {
        Self {
            tool,
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            timeout_secs,
        }
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    /// Build the merge command without running it.
    pub fn build_command(&self, video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .add_input(audio)
            .map("0:v")
            .map("1:a")
            .video_codec("copy")
            .audio_codec(DEFAULT_AUDIO_CODEC)
            .audio_bitrate(self.audio_bitrate.clone())
            .shortest()
    }

    pub async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<MergedVideo> {
        ensure_non_empty(video).await?;
        ensure_non_empty(audio).await?;

        let video_duration = self.tool.probe_duration(video).await?;
        let audio_duration = self.tool.probe_duration(audio).await?;
        let duration = video_duration.min(audio_duration);
        if duration <= 0.0 {
            let path = if video_duration <= audio_duration { video } else { audio };
            return Err(MediaError::InvalidDuration {
                path: path.to_path_buf(),
                duration,
            });
        }

        let cmd = self.build_command(video, audio, output);
        self.tool.encode(&cmd, self.timeout_secs).await?;

        info!(
            output = %output.display(),
            duration_secs = duration,
            "Merged audio and video"
        );

        Ok(MergedVideo {
            path: output.to_path_buf(),
            duration_seconds: duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockMediaTool;

    async fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
        let video = dir.join("video.mp4");
        let audio = dir.join("audio.mp3");
        tokio::fs::write(&video, b"v").await.unwrap();
        tokio::fs::write(&audio, b"a").await.unwrap();
        (video, audio)
    }

    #[tokio::test]
    async fn test_merge_uses_shortest_stream() {
        let temp = tempfile::tempdir().unwrap();
        let (video, audio) = fixtures(temp.path()).await;

        let mut mock = MockMediaTool::new();
        mock.expect_probe_duration().returning(|p| {
            if p.extension().is_some_and(|e| e == "mp4") {
                Ok(8.0)
            } else {
                Ok(5.5)
            }
        });
        mock.expect_encode().times(1).returning(|cmd, _| {
            let args = cmd.build_args();
            assert!(args.contains(&"-shortest".to_string()));
            assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
            assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "1:a"));
            Ok(())
        });

        let merger = AudioVideoMerger::new(Arc::new(mock), 120);
        let merged = merger
            .merge(&video, &audio, &temp.path().join("out.mp4"))
            .await
            .unwrap();
        assert_eq!(merged.duration_seconds, 5.5);
    }

    #[tokio::test]
    async fn test_merge_rejects_missing_and_zero_duration() {
        let temp = tempfile::tempdir().unwrap();
        let (video, audio) = fixtures(temp.path()).await;

        let mut mock = MockMediaTool::new();
        mock.expect_probe_duration().returning(|_| Ok(0.0));
        mock.expect_encode().never();
        let merger = AudioVideoMerger::new(Arc::new(mock), 120);

        let err = merger
            .merge(&video, &audio, &temp.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidDuration { .. }));

        let err = merger
            .merge(&temp.path().join("gone.mp4"), &audio, &temp.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
