//! Render one narrative unit into a fixed-resolution clip.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use reel_models::{EncodingConfig, NarrativeUnit, PaddingPolicy, RenderedSegment, Resolution, VisualKind};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::filters::{padding_filter, PADDED_VIDEO_LABEL};
use crate::fs_utils::ensure_non_empty;
use crate::looping::LoopExpander;
use crate::merge::AudioVideoMerger;
use crate::tool::{MediaTool, ToolTimeouts};

/// File name of the rendered clip for a zero-based unit index.
pub fn segment_file_name(index: usize) -> String {
    format!("segment_{}.mp4", index + 1)
}

/// Renders units into `segments_dir`, one uniquely named file per index.
///
/// Renders for different indices share no mutable state and may run
/// concurrently.
#[derive(Clone)]
pub struct SegmentRenderer {
    tool: Arc<dyn MediaTool>,
    segments_dir: PathBuf,
    resolution: Resolution,
    padding: PaddingPolicy,
    encoding: EncodingConfig,
    timeouts: ToolTimeouts,
}

impl SegmentRenderer {
    pub fn new(tool: Arc<dyn MediaTool>, segments_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            segments_dir: segments_dir.into(),
            resolution: Resolution::default(),
            padding: PaddingPolicy::default(),
            encoding: EncodingConfig::default(),
            timeouts: ToolTimeouts::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ToolTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn segments_dir(&self) -> &Path {
        &self.segments_dir
    }

    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.segments_dir.join(segment_file_name(index))
    }

    /// Build the still-image encode: the image looped as a single-frame
    /// source, padded to the frame, cut at the narration length.
    pub fn build_still_command(
        &self,
        image: &Path,
        audio: &Path,
        duration_secs: f64,
        output: &Path,
    ) -> FfmpegCommand {
        FfmpegCommand::new(image, output)
            .loop_input()
            .add_input(audio)
            .filter_complex(padding_filter(self.padding, self.resolution))
            .map(PADDED_VIDEO_LABEL)
            .map("1:a")
            .video_encoding(&self.encoding)
            .tune("stillimage")
            .audio_encoding(&self.encoding)
            .duration(duration_secs)
            .shortest()
    }

    /// Render a unit according to the kind of its visual file.
    pub async fn render_unit(&self, unit: &NarrativeUnit) -> MediaResult<RenderedSegment> {
        let audio = unit.audio_path.as_deref().ok_or_else(|| {
            MediaError::invalid_input(format!("unit {} has no narration audio", unit.index))
        })?;
        match unit.visual_kind() {
            VisualKind::Still => self.render(&unit.image_path, audio, unit.index).await,
            VisualKind::Motion => self.render_motion(&unit.image_path, audio, unit.index).await,
        }
    }

    /// Render a still image against its narration.
    ///
    /// The clip length equals the probed audio duration.
    pub async fn render(&self, image: &Path, audio: &Path, index: usize) -> MediaResult<RenderedSegment> {
        ensure_non_empty(image).await?;
        ensure_non_empty(audio).await?;

        let duration = self.narration_duration(audio).await?;

        tokio::fs::create_dir_all(&self.segments_dir).await?;
        let output = self.segment_path(index);

        debug!(
            index,
            image = %image.display(),
            audio = %audio.display(),
            duration_secs = duration,
            "Rendering still segment"
        );

        let cmd = self.build_still_command(image, audio, duration, &output);
        self.tool.encode(&cmd, self.timeouts.render_secs).await?;

        info!(index, path = %output.display(), duration_secs = duration, "Created video segment");
        Ok(RenderedSegment::new(index, output, duration))
    }

    /// Render a generated motion clip against its narration.
    ///
    /// A clip shorter than the narration is looped first; the merge then
    /// trims to the narration length.
    pub async fn render_motion(
        &self,
        video: &Path,
        audio: &Path,
        index: usize,
    ) -> MediaResult<RenderedSegment> {
        ensure_non_empty(video).await?;
        ensure_non_empty(audio).await?;

        let audio_duration = self.narration_duration(audio).await?;
        let video_duration = self.tool.probe_duration(video).await?;

        tokio::fs::create_dir_all(&self.segments_dir).await?;
        let output = self.segment_path(index);

        let source = if video_duration < audio_duration {
            info!(
                index,
                video_duration,
                audio_duration,
                "Video shorter than narration, looping"
            );
            let looped_path = self
                .segments_dir
                .join(format!("looped_video_{}.mp4", index + 1));
            LoopExpander::new(Arc::clone(&self.tool), self.timeouts.concat_secs)
                .expand(video, audio_duration, &looped_path)
                .await?
                .path
        } else {
            video.to_path_buf()
        };

        let merged = AudioVideoMerger::new(Arc::clone(&self.tool), self.timeouts.merge_secs)
            .with_audio_bitrate(self.encoding.audio_bitrate.clone())
            .merge(&source, audio, &output)
            .await?;

        info!(index, path = %output.display(), duration_secs = merged.duration_seconds, "Created motion segment");
        Ok(RenderedSegment::new(index, merged.path, merged.duration_seconds))
    }

    async fn narration_duration(&self, audio: &Path) -> MediaResult<f64> {
        let duration = self.tool.probe_duration(audio).await?;
        if duration <= 0.0 {
            return Err(MediaError::InvalidDuration {
                path: audio.to_path_buf(),
                duration,
            });
        }
        Ok(duration)
    }
}
