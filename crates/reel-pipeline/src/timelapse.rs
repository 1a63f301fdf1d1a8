//! Time-lapse pipeline driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{warn, Instrument};

use reel_media::interpolate::interpolate_between;
use reel_media::{MediaTool, TimelapseOutput, TransitionAssembler, TransitionSettings};
use reel_models::{FrameTiming, RunReport, RunStage, TimelapseFrame, TransitionKind, VisualKind};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{record_run_failed, RunLogger};
use crate::workspace::{list_sorted, RunWorkspace};

/// Name of the assembled time-lapse inside the run directory.
pub const TIMELAPSE_OUTPUT_FILE: &str = "timelapse_video.mp4";

/// Knobs for one time-lapse run.
#[derive(Debug, Clone)]
pub struct TimelapseOptions {
    pub timing: FrameTiming,
    pub transition: TransitionKind,
    pub transition_duration: f64,
    /// Burn each real frame's file stem (e.g. the year) into the frame
    pub label_frames: bool,
    /// Overrides the workspace's `timelapse_images/`
    pub images_dir: Option<PathBuf>,
    pub music: Option<PathBuf>,
}

impl Default for TimelapseOptions {
    fn default() -> Self {
        Self {
            timing: FrameTiming::default(),
            transition: TransitionKind::default(),
            transition_duration: 1.0,
            label_frames: true,
            images_dir: None,
            music: None,
        }
    }
}

/// Build the display sequence: each real frame followed by `k` blended
/// in-between frames towards the next real frame.
///
/// Interpolated frames always get the shorter inter-frame duration. If
/// blending a pair fails, that gap is left as a hard step. With
/// `label_frames`, real frames record their file stem as label; the caption
/// itself must already be drawn into `real_frames`.
pub async fn build_frame_sequence(
    real_frames: &[PathBuf],
    timing: &FrameTiming,
    label_frames: bool,
    interp_dir: &Path,
) -> PipelineResult<Vec<TimelapseFrame>> {
    if !timing.is_valid() {
        return Err(PipelineError::invalid_input(
            "inter-frame duration must be positive and shorter than the main frame duration",
        ));
    }

    let mut frames = Vec::with_capacity(timing.sequence_len(real_frames.len()));

    for (i, path) in real_frames.iter().enumerate() {
        let mut frame = TimelapseFrame::real(path, timing.main_frame_duration);
        if label_frames {
            if let Some(stem) = path.file_stem() {
                frame = frame.with_label(stem.to_string_lossy());
            }
        }
        frames.push(frame);

        let Some(next) = real_frames.get(i + 1) else {
            continue;
        };

        match interpolate_between(path, next, timing.inter_frames, interp_dir).await {
            Ok(blended) => frames.extend(
                blended
                    .into_iter()
                    .map(|p| TimelapseFrame::interpolated(p, timing.inter_frame_duration)),
            ),
            Err(e) => warn!(
                from = %path.display(),
                to = %next.display(),
                error = %e,
                "Frame interpolation failed, skipping in-between frames"
            ),
        }
    }

    Ok(frames)
}

/// Assembles the real frames of a workspace into a smooth time-lapse.
pub struct TimelapsePipeline {
    config: PipelineConfig,
    tool: Arc<dyn MediaTool>,
    options: TimelapseOptions,
}

impl TimelapsePipeline {
    pub fn new(config: PipelineConfig, tool: Arc<dyn MediaTool>, options: TimelapseOptions) -> Self {
        Self { config, tool, options }
    }

    pub async fn run(&self, workspace: &RunWorkspace) -> RunReport {
        let logger = RunLogger::new(workspace.run_id(), "timelapse");
        let span = logger.create_span();

        let report = async {
            logger.log_start(&format!("workspace {}", workspace.root().display()));
            let mut stage = RunStage::Collecting;

            match self.execute(workspace, &mut stage).await {
                Ok(output) => {
                    logger.log_completion(&format!(
                        "{} clips, {} transitions -> {}",
                        output.clip_count,
                        output.transition_count,
                        output.path.display()
                    ));
                    RunReport::succeeded(workspace.run_id().clone(), output.path, Vec::new())
                }
                Err(e) => {
                    logger.log_failure(stage, e.kind(), e.category(), &e.to_string());
                    record_run_failed(e.kind(), e.category());
                    RunReport::failed(workspace.run_id().clone(), stage, e.kind(), e.to_string())
                }
            }
        }
        .instrument(span)
        .await;

        if let Err(e) = workspace.write_report(&report).await {
            warn!(error = %e, "Failed to write run report");
        }

        report
    }

    async fn execute(&self, workspace: &RunWorkspace, stage: &mut RunStage) -> PipelineResult<TimelapseOutput> {
        let images_dir = self
            .options
            .images_dir
            .clone()
            .unwrap_or_else(|| workspace.timelapse_images_dir());

        let real = list_sorted(&images_dir, |p| VisualKind::from_path(p) == Some(VisualKind::Still)).await?;
        if real.is_empty() {
            return Err(PipelineError::NoImagesFound(images_dir.display().to_string()));
        }

        let settings = TransitionSettings {
            transition_duration: self.options.transition_duration,
            transition: self.options.transition,
            frame_duration: self.options.timing.main_frame_duration,
            frame_rate: self.config.encoding.frame_rate,
            resolution: self.config.resolution,
            encoding: self.config.encoding.clone(),
        };
        let assembler = TransitionAssembler::new(Arc::clone(&self.tool), workspace.root())
            .with_settings(settings)
            .with_timeouts(self.config.timeouts);

        // Labels go in before blending so in-between frames cross-fade them
        let sources = if self.options.label_frames {
            assembler.annotate_frames(&real).await?
        } else {
            real
        };

        let frames = build_frame_sequence(
            &sources,
            &self.options.timing,
            self.options.label_frames,
            &assembler.work_dir().join("interpolated"),
        )
        .await?;

        *stage = RunStage::Rendering;

        let output = assembler
            .assemble(&frames, TIMELAPSE_OUTPUT_FILE, self.options.music.as_deref())
            .await?;

        *stage = RunStage::Done;
        Ok(output)
    }
}
