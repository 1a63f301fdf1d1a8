//! Story pipeline: reconcile text, visuals and narration into one video.
//!
//! Stages run strictly forward:
//! `Collecting -> Reconciling -> Rendering -> Concatenating -> Done | Failed`.
//! Per-unit failures shrink the working set; only an empty working set or a
//! precondition failure ends the run.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn, Instrument};

use reel_media::{MediaTool, SegmentConcatenator, SegmentRenderer};
use reel_models::{NarrativeUnit, RenderedSegment, RunReport, RunStage, UnitRecord};

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{record_run_failed, record_segment_rendered, record_units_dropped, RunLogger};
use crate::mapping::write_mapping;
use crate::reconcile::{align_units, reconcile_counts, ReconcilePolicy};
use crate::workspace::{RunWorkspace, FINAL_VIDEO_FILE};

/// Forward-only stage bookkeeping for one run.
#[derive(Debug, Default)]
struct StageTracker {
    stage: RunStage,
}

impl StageTracker {
    fn advance(&mut self, next: RunStage) -> PipelineResult<()> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::invalid_input(format!(
                "illegal stage transition {} -> {}",
                self.stage, next
            )));
        }
        debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        Ok(())
    }

    /// Move to `Failed`, returning the stage that was running.
    fn fail(&mut self) -> RunStage {
        let failed_at = self.stage;
        if self.stage.can_advance_to(RunStage::Failed) {
            self.stage = RunStage::Failed;
        }
        failed_at
    }
}

/// Artifacts of a successful story run.
#[derive(Debug, Clone)]
pub struct StoryOutput {
    pub final_video: PathBuf,
    pub mapping_file: PathBuf,
    pub units: Vec<UnitRecord>,
    pub policy: ReconcilePolicy,
    /// The final video is a plain copy of the only rendered segment
    pub single_copy_fallback: bool,
}

/// Drives one story run over a workspace.
///
/// The media tool and collaborators are constructed once by the caller and
/// shared by reference with every component.
pub struct StoryPipeline {
    config: PipelineConfig,
    tool: Arc<dyn MediaTool>,
    collaborators: Collaborators,
    cancel: Option<watch::Receiver<bool>>,
}

impl StoryPipeline {
    pub fn new(config: PipelineConfig, tool: Arc<dyn MediaTool>, collaborators: Collaborators) -> Self {
        Self {
            config,
            tool,
            collaborators,
            cancel: None,
        }
    }

    /// Abandon the run between units once the receiver reads `true`.
    /// A render that already started always finishes.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn check_cancel(&self) -> PipelineResult<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run the pipeline and return a structured report. The report is also
    /// written to the workspace. Failures never escape as errors.
    pub async fn run(&self, workspace: &RunWorkspace, story: &str) -> RunReport {
        let logger = RunLogger::new(workspace.run_id(), "story");
        let span = logger.create_span();

        let report = async {
            logger.log_start(&format!("workspace {}", workspace.root().display()));
            let mut tracker = StageTracker::default();

            match self.execute(workspace, story, &mut tracker, &logger).await {
                Ok(output) => {
                    logger.log_completion(&format!(
                        "{} segments -> {}",
                        output.units.len(),
                        output.final_video.display()
                    ));
                    RunReport::succeeded(workspace.run_id().clone(), output.final_video, output.units)
                        .with_mapping_file(output.mapping_file)
                }
                Err(e) => {
                    let failed_at = tracker.fail();
                    logger.log_failure(failed_at, e.kind(), e.category(), &e.to_string());
                    record_run_failed(e.kind(), e.category());
                    RunReport::failed(workspace.run_id().clone(), failed_at, e.kind(), e.to_string())
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

    /// Run every stage, returning the artifacts or the first fatal error.
    async fn execute(
        &self,
        workspace: &RunWorkspace,
        story: &str,
        tracker: &mut StageTracker,
        logger: &RunLogger,
    ) -> PipelineResult<StoryOutput> {
        // Collecting
        let visuals = workspace.collect_visuals().await?;
        if visuals.is_empty() {
            return Err(PipelineError::NoImagesFound(
                workspace.images_dir().display().to_string(),
            ));
        }

        let segments: Vec<String> = self
            .collaborators
            .segmenter
            .segment(story)
            .await?
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if segments.is_empty() {
            return Err(PipelineError::NoTextSegments);
        }
        logger.log_progress(&format!(
            "{} visuals, {} text segments",
            visuals.len(),
            segments.len()
        ));
        self.check_cancel()?;

        // Reconciling
        tracker.advance(RunStage::Reconciling)?;
        let (aligned, policy) = reconcile_counts(&segments, visuals.len());
        info!(?policy, units = aligned.len(), "Reconciled segment count");
        let units = align_units(&aligned, &visuals);
        let narrated = self.narrate_units(units).await?;

        // Rendering
        tracker.advance(RunStage::Rendering)?;
        let rendered = self.render_units(workspace, &narrated).await?;
        self.check_cancel()?;

        // Concatenating
        tracker.advance(RunStage::Concatenating)?;
        let clips: Vec<PathBuf> = rendered.iter().map(|(_, seg)| seg.file_path.clone()).collect();
        let concatenation = SegmentConcatenator::new(
            Arc::clone(&self.tool),
            workspace.root(),
            self.config.timeouts.concat_secs,
        )
        .concatenate(&clips, FINAL_VIDEO_FILE)
        .await
        .map_err(|e| PipelineError::Concatenation(e.to_string()))?;

        if concatenation.single_copy_fallback {
            logger.log_warning("concatenation failed, final video is the single rendered segment");
        }

        let units: Vec<UnitRecord> = rendered
            .iter()
            .map(|(unit, seg)| UnitRecord {
                index: unit.index,
                text: unit.text.clone(),
                image: unit.image_path.clone(),
                audio: unit.audio_path.clone(),
                segment: Some(seg.file_path.clone()),
                duration_seconds: Some(seg.duration_seconds),
            })
            .collect();

        let mapping_file = workspace.mapping_path();
        write_mapping(&mapping_file, story, &units, workspace.root()).await?;

        tracker.advance(RunStage::Done)?;

        Ok(StoryOutput {
            final_video: concatenation.path,
            mapping_file,
            units,
            policy,
            single_copy_fallback: concatenation.single_copy_fallback,
        })
    }

    /// Narrate and probe every unit. A unit whose narration fails or whose
    /// audio has no positive duration is dropped together with its text and
    /// visual, so the remaining lists stay paired.
    async fn narrate_units(&self, units: Vec<NarrativeUnit>) -> PipelineResult<Vec<NarrativeUnit>> {
        let total = units.len();
        let mut narrated = Vec::with_capacity(total);

        for unit in units {
            self.check_cancel()?;

            let audio = match self.collaborators.narrator.narrate(unit.index, &unit.text).await {
                Ok(audio) => audio,
                Err(e) => {
                    warn!(index = unit.index, error = %e, "Narration failed, dropping unit");
                    continue;
                }
            };

            match self.tool.probe_duration(&audio).await {
                Ok(duration) if duration > 0.0 => {
                    debug!(index = unit.index, duration_secs = duration, "Narration ready");
                    narrated.push(unit.with_narration(audio, duration));
                }
                Ok(duration) => {
                    warn!(
                        index = unit.index,
                        path = %audio.display(),
                        duration_secs = duration,
                        "Narration has no duration, dropping unit"
                    );
                }
                Err(e) => {
                    warn!(
                        index = unit.index,
                        path = %audio.display(),
                        error = %e,
                        "Narration probe failed, dropping unit"
                    );
                }
            }
        }

        record_units_dropped("narration", total - narrated.len());

        if narrated.is_empty() {
            return Err(PipelineError::AllNarrationFailed);
        }
        Ok(narrated)
    }

    /// Render units with at most `max_parallel_renders` encodes in flight.
    /// Waits for every render before returning; results are in index order.
    async fn render_units(
        &self,
        workspace: &RunWorkspace,
        units: &[NarrativeUnit],
    ) -> PipelineResult<Vec<(NarrativeUnit, RenderedSegment)>> {
        let renderer = SegmentRenderer::new(Arc::clone(&self.tool), workspace.segments_dir())
            .with_resolution(self.config.resolution)
            .with_padding(self.config.padding)
            .with_encoding(self.config.encoding.clone())
            .with_timeouts(self.config.timeouts);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_renders.max(1)));

        let tasks = units.iter().map(|unit| {
            let renderer = renderer.clone();
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| PipelineError::invalid_input("render pool closed"))?;
                // Checked after the permit so queued units are abandoned
                self.check_cancel()?;
                renderer
                    .render_unit(unit)
                    .await
                    .map_err(PipelineError::from)
            }
        });

        let results = join_all(tasks).await;

        let mut rendered = Vec::with_capacity(units.len());
        let mut cancelled = false;
        for (unit, result) in units.iter().zip(results) {
            match result {
                Ok(segment) => {
                    record_segment_rendered();
                    rendered.push((unit.clone(), segment));
                }
                Err(PipelineError::Cancelled) => cancelled = true,
                Err(e) => {
                    let tool_failure = matches!(&e, PipelineError::Media(m) if m.is_tool_failure());
                    warn!(
                        index = unit.index,
                        image = %unit.image_path.display(),
                        tool_failure,
                        error = %e,
                        "Segment render failed, dropping unit"
                    );
                }
            }
        }

        if cancelled {
            return Err(PipelineError::Cancelled);
        }

        record_units_dropped("render", units.len() - rendered.len());

        if rendered.is_empty() {
            return Err(PipelineError::AllRendersFailed);
        }

        rendered.sort_by_key(|(unit, _)| unit.index);
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockNarrator, MockTextSegmenter};
    use reel_media::FfmpegTool;

    async fn workspace_with_stills(temp: &tempfile::TempDir, count: usize) -> RunWorkspace {
        let ws = RunWorkspace::create(temp.path()).await.unwrap();
        for i in 1..=count {
            tokio::fs::write(ws.images_dir().join(format!("image_{}.png", i)), b"png")
                .await
                .unwrap();
        }
        ws
    }

    fn pipeline(segmenter: MockTextSegmenter, narrator: MockNarrator) -> StoryPipeline {
        // Never reached: every run here fails before rendering
        let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::new(5));
        StoryPipeline::new(
            PipelineConfig::default(),
            tool,
            Collaborators {
                segmenter: Arc::new(segmenter),
                narrator: Arc::new(narrator),
            },
        )
    }

    #[tokio::test]
    async fn test_segmenter_failure_skips_narration() {
        let temp = tempfile::tempdir().unwrap();
        let ws = workspace_with_stills(&temp, 2).await;

        let mut segmenter = MockTextSegmenter::new();
        segmenter
            .expect_segment()
            .times(1)
            .returning(|_| Err(PipelineError::collaborator("model offline")));
        let mut narrator = MockNarrator::new();
        narrator.expect_narrate().never();

        let report = pipeline(segmenter, narrator).run(&ws, "Once upon a time.").await;

        assert!(!report.success);
        assert_eq!(report.error_kind.as_deref(), Some("collaborator_failed"));
        assert_eq!(report.stage, RunStage::Failed);
        assert_eq!(report.failed_stage, Some(RunStage::Collecting));
    }

    #[tokio::test]
    async fn test_every_narration_failing_fails_run() {
        let temp = tempfile::tempdir().unwrap();
        let ws = workspace_with_stills(&temp, 2).await;

        let mut segmenter = MockTextSegmenter::new();
        segmenter
            .expect_segment()
            .returning(|_| Ok(vec!["first".to_string(), "second".to_string()]));
        let mut narrator = MockNarrator::new();
        narrator
            .expect_narrate()
            .times(2)
            .returning(|index, _| Err(PipelineError::collaborator(format!("no voice for {}", index))));

        let report = pipeline(segmenter, narrator).run(&ws, "First. Second.").await;

        assert_eq!(report.error_kind.as_deref(), Some("all_narration_failed"));
        assert_eq!(report.failed_stage, Some(RunStage::Reconciling));
    }

    #[test]
    fn test_stage_tracker_is_forward_only() {
        let mut tracker = StageTracker::default();
        assert!(tracker.advance(RunStage::Reconciling).is_ok());
        assert!(tracker.advance(RunStage::Rendering).is_ok());
        assert!(tracker.advance(RunStage::Reconciling).is_err());
        assert_eq!(tracker.stage, RunStage::Rendering);
        assert!(tracker.advance(RunStage::Concatenating).is_ok());
        assert!(tracker.advance(RunStage::Done).is_ok());
        assert!(tracker.advance(RunStage::Failed).is_err());
    }

    #[test]
    fn test_stage_tracker_fail_reports_running_stage() {
        let mut tracker = StageTracker::default();
        tracker.advance(RunStage::Reconciling).unwrap();
        assert_eq!(tracker.fail(), RunStage::Reconciling);
        assert_eq!(tracker.stage, RunStage::Failed);
        assert!(tracker.advance(RunStage::Rendering).is_err());
    }
}
