//! Time-lapse assembly with crossfade transitions.
//!
//! Every frame becomes a static clip, adjacent real frames get a crossfade
//! clip between them, and the interleaved list is joined with re-encoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use reel_models::{EncodingConfig, Resolution, TimelapseFrame, TransitionKind};

use crate::command::FfmpegCommand;
use crate::concat::{ConcatMode, SegmentConcatenator};
use crate::error::{MediaError, MediaResult};
use crate::filters::{filter_label, filter_normalize, filter_xfade};
use crate::merge::AudioVideoMerger;
use crate::tool::{MediaTool, ToolTimeouts};

/// Scratch directory created inside the run directory.
pub const TIMELAPSE_WORK_DIR: &str = "timelapse_work";

/// Time-lapse rendering settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSettings {
    /// Length of each crossfade clip in seconds
    pub transition_duration: f64,
    pub transition: TransitionKind,
    /// Display time for frames that carry no explicit duration
    pub frame_duration: f64,
    pub frame_rate: u32,
    pub resolution: Resolution,
    pub encoding: EncodingConfig,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            transition_duration: 1.0,
            transition: TransitionKind::default(),
            frame_duration: 1.0,
            frame_rate: 30,
            resolution: Resolution::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

/// One entry of the concatenation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceItem {
    /// Static clip of the frame at this position
    Clip(usize),
    /// Crossfade between real frame `n` and real frame `n + 1`
    Transition(usize),
}

/// Order clips and transitions.
///
/// Every frame contributes its clip in order. The transition between real
/// frames `j` and `j + 1` is placed right after the clip of real frame `j`,
/// ahead of any in-between frames that follow it.
pub fn plan_sequence(frames: &[TimelapseFrame]) -> Vec<SequenceItem> {
    let real_total = frames.iter().filter(|f| !f.is_interpolated).count();
    let mut plan = Vec::with_capacity(frames.len() + real_total.saturating_sub(1));
    let mut real_seen = 0;

    for (i, frame) in frames.iter().enumerate() {
        plan.push(SequenceItem::Clip(i));
        if !frame.is_interpolated {
            if real_seen + 1 < real_total {
                plan.push(SequenceItem::Transition(real_seen));
            }
            real_seen += 1;
        }
    }

    plan
}

/// Result of a time-lapse assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelapseOutput {
    pub path: PathBuf,
    /// Background music was requested and attached
    pub music_muxed: bool,
    pub clip_count: usize,
    pub transition_count: usize,
}

/// Builds smooth time-lapse videos inside a run directory.
#[derive(Clone)]
pub struct TransitionAssembler {
    tool: Arc<dyn MediaTool>,
    run_dir: PathBuf,
    settings: TransitionSettings,
    timeouts: ToolTimeouts,
}

impl TransitionAssembler {
    pub fn new(tool: Arc<dyn MediaTool>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            run_dir: run_dir.into(),
            settings: TransitionSettings::default(),
            timeouts: ToolTimeouts::default(),
        }
    }

    pub fn with_settings(mut self, settings: TransitionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ToolTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn work_dir(&self) -> PathBuf {
        self.run_dir.join(TIMELAPSE_WORK_DIR)
    }

    /// Burn each source's file stem into a copy under `annotated/`.
    ///
    /// Returned paths keep the source order and file names. A frame whose
    /// label cannot be drawn is passed through unlabelled.
    pub async fn annotate_frames(&self, sources: &[PathBuf]) -> MediaResult<Vec<PathBuf>> {
        let annotated_dir = self.work_dir().join("annotated");
        tokio::fs::create_dir_all(&annotated_dir).await?;

        let mut annotated = Vec::with_capacity(sources.len());
        for source in sources {
            let (Some(stem), Some(name)) = (source.file_stem(), source.file_name()) else {
                annotated.push(source.clone());
                continue;
            };
            let out = annotated_dir.join(name);
            let cmd = FfmpegCommand::new(source, &out)
                .video_filter(filter_label(&stem.to_string_lossy(), self.settings.resolution))
                .output_args(["-frames:v", "1"]);

            match self.tool.encode(&cmd, self.timeouts.transition_secs).await {
                Ok(()) => annotated.push(out),
                Err(e) => {
                    warn!(path = %source.display(), error = %e, "Failed to label frame, using it unlabelled");
                    annotated.push(source.clone());
                }
            }
        }

        debug!(frames = annotated.len(), "Annotated time-lapse frames");
        Ok(annotated)
    }

    /// Assemble `frames` into `<run_dir>/<output_name>`, optionally with
    /// background music.
    pub async fn assemble(
        &self,
        frames: &[TimelapseFrame],
        output_name: &str,
        music: Option<&Path>,
    ) -> MediaResult<TimelapseOutput> {
        if self.settings.transition_duration <= 0.0 {
            return Err(MediaError::invalid_input("transition duration must be positive"));
        }

        let mut present = Vec::with_capacity(frames.len());
        for frame in frames {
            if tokio::fs::metadata(&frame.image_path).await.is_ok() {
                present.push(frame.clone());
            } else {
                warn!(path = %frame.image_path.display(), "Time-lapse frame not found, skipping");
            }
        }
        if present.is_empty() {
            return Err(MediaError::invalid_input("no time-lapse frames to assemble"));
        }

        let work = self.work_dir();
        let processed_dir = work.join("processed");
        let transitions_dir = work.join("transitions");
        tokio::fs::create_dir_all(&processed_dir).await?;
        tokio::fs::create_dir_all(&transitions_dir).await?;

        info!(
            frames = present.len(),
            transition = %self.settings.transition,
            "Assembling time-lapse"
        );

        let mut normalized = Vec::with_capacity(present.len());
        for (i, frame) in present.iter().enumerate() {
            let out = processed_dir.join(format!("processed_{:04}.png", i));
            self.normalize_frame(frame, &out).await?;
            normalized.push(out);
        }

        let mut clips = Vec::with_capacity(present.len());
        for (i, (frame, image)) in present.iter().zip(&normalized).enumerate() {
            let out = transitions_dir.join(format!("clip_{:04}.mp4", i));
            let duration = if frame.display_duration_seconds > 0.0 {
                frame.display_duration_seconds
            } else {
                self.settings.frame_duration
            };
            self.render_clip(image, duration, &out).await?;
            clips.push(out);
        }

        let real_images: Vec<&PathBuf> = present
            .iter()
            .zip(&normalized)
            .filter(|(frame, _)| !frame.is_interpolated)
            .map(|(_, image)| image)
            .collect();

        let mut transitions = Vec::with_capacity(real_images.len().saturating_sub(1));
        for (j, pair) in real_images.windows(2).enumerate() {
            let out = transitions_dir.join(format!("transition_{:04}_{:04}.mp4", j, j + 1));
            self.render_transition(pair[0], pair[1], &out).await?;
            transitions.push(out);
        }

        let ordered: Vec<PathBuf> = plan_sequence(&present)
            .into_iter()
            .map(|item| match item {
                SequenceItem::Clip(i) => clips[i].clone(),
                SequenceItem::Transition(j) => transitions[j].clone(),
            })
            .collect();

        let concatenation = SegmentConcatenator::new(
            Arc::clone(&self.tool),
            &self.run_dir,
            self.timeouts.concat_secs,
        )
        .with_mode(ConcatMode::Reencode(self.settings.encoding.clone()))
        .with_list_dir(&work)
        .concatenate(&ordered, output_name)
        .await?;

        let mut output = TimelapseOutput {
            path: concatenation.path,
            music_muxed: false,
            clip_count: clips.len(),
            transition_count: transitions.len(),
        };

        if let Some(music) = music {
            self.attach_music(&mut output, music).await;
        }

        info!(
            path = %output.path.display(),
            clips = output.clip_count,
            transitions = output.transition_count,
            music = output.music_muxed,
            "Created time-lapse video"
        );

        Ok(output)
    }

    async fn normalize_frame(&self, frame: &TimelapseFrame, out: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&frame.image_path, out)
            .video_filter(filter_normalize(self.settings.resolution))
            .output_args(["-frames:v", "1"]);

        debug!(source = %frame.image_path.display(), output = %out.display(), "Normalizing frame");
        self.tool.encode(&cmd, self.timeouts.transition_secs).await
    }

    async fn render_clip(&self, image: &Path, duration: f64, out: &Path) -> MediaResult<()> {
        let encoding = &self.settings.encoding;
        let cmd = FfmpegCommand::new(image, out)
            .loop_input()
            .input_duration(duration)
            .video_codec(encoding.codec.clone())
            .pixel_format(encoding.pixel_format.clone())
            .frame_rate(self.settings.frame_rate);

        self.tool.encode(&cmd, self.timeouts.transition_secs).await
    }

    async fn render_transition(&self, from: &Path, to: &Path, out: &Path) -> MediaResult<()> {
        let d = self.settings.transition_duration;
        let encoding = &self.settings.encoding;
        let cmd = FfmpegCommand::new(from, out)
            .loop_input()
            .input_duration(d)
            .add_input(to)
            .loop_input()
            .input_duration(d)
            .filter_complex(filter_xfade(self.settings.transition, d))
            .map("[v]")
            .video_codec(encoding.codec.clone())
            .pixel_format(encoding.pixel_format.clone())
            .frame_rate(self.settings.frame_rate)
            .duration(d);

        debug!(from = %from.display(), to = %to.display(), "Rendering transition");
        self.tool.encode(&cmd, self.timeouts.transition_secs).await
    }

    /// Replace the output with a music-muxed copy; keep the silent video if
    /// the music is missing or the merge fails.
    async fn attach_music(&self, output: &mut TimelapseOutput, music: &Path) {
        if tokio::fs::metadata(music).await.is_err() {
            warn!(path = %music.display(), "Background music not found, keeping silent video");
            return;
        }

        let stem = output
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "timelapse_video".to_string());
        let muxed_path = output.path.with_file_name(format!("{}_audio.mp4", stem));

        let merger = AudioVideoMerger::new(Arc::clone(&self.tool), self.timeouts.merge_secs)
            .with_audio_bitrate(self.settings.encoding.audio_bitrate.clone());

        match merger.merge(&output.path, music, &muxed_path).await {
            Ok(merged) => {
                output.path = merged.path;
                output.music_muxed = true;
            }
            Err(e) => {
                warn!(error = %e, "Failed to merge background music, keeping silent video");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockMediaTool;

    fn frames(pattern: &[bool]) -> Vec<TimelapseFrame> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, interp)| {
                if *interp {
                    TimelapseFrame::interpolated(format!("{}.png", i), 0.03)
                } else {
                    TimelapseFrame::real(format!("{}.png", i), 1.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_plan_real_frames_only() {
        let plan = plan_sequence(&frames(&[false, false, false]));
        assert_eq!(
            plan,
            vec![
                SequenceItem::Clip(0),
                SequenceItem::Transition(0),
                SequenceItem::Clip(1),
                SequenceItem::Transition(1),
                SequenceItem::Clip(2),
            ]
        );
    }

    #[test]
    fn test_plan_with_interpolated_frames() {
        // real, interp, interp, real
        let plan = plan_sequence(&frames(&[false, true, true, false]));
        assert_eq!(
            plan,
            vec![
                SequenceItem::Clip(0),
                SequenceItem::Transition(0),
                SequenceItem::Clip(1),
                SequenceItem::Clip(2),
                SequenceItem::Clip(3),
            ]
        );
    }

    #[test]
    fn test_plan_single_frame() {
        assert_eq!(plan_sequence(&frames(&[false])), vec![SequenceItem::Clip(0)]);
        assert!(plan_sequence(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_assemble_counts_and_music_fallback() {
        let temp = tempfile::tempdir().unwrap();
        let mut seq = Vec::new();
        for name in ["2000.png", "2001.png", "2002.png"] {
            let p = temp.path().join(name);
            tokio::fs::write(&p, b"img").await.unwrap();
            seq.push(TimelapseFrame::real(p, 1.0));
        }
        seq.push(TimelapseFrame::real(temp.path().join("missing.png"), 1.0));

        let mut mock = MockMediaTool::new();
        mock.expect_encode().returning(|cmd, _| {
            std::fs::write(cmd.output(), b"media").unwrap();
            Ok(())
        });
        // Music probe fails, so the silent output must be kept
        mock.expect_probe_duration()
            .returning(|p| Err(MediaError::probe_failed(p, "corrupt")));

        let music = temp.path().join("music.mp3");
        tokio::fs::write(&music, b"music").await.unwrap();

        let assembler = TransitionAssembler::new(Arc::new(mock), temp.path());
        let out = assembler
            .assemble(&seq, "timelapse_video.mp4", Some(&music))
            .await
            .unwrap();

        assert_eq!(out.clip_count, 3);
        assert_eq!(out.transition_count, 2);
        assert!(!out.music_muxed);
        assert!(out.path.ends_with("timelapse_video.mp4"));
        assert!(temp.path().join("timelapse_work/processed/processed_0002.png").exists());
        assert!(temp
            .path()
            .join("timelapse_work/transitions/transition_0001_0002.mp4")
            .exists());
    }

    #[tokio::test]
    async fn test_annotate_frames_draws_stem_and_passes_failures_through() {
        let temp = tempfile::tempdir().unwrap();
        let sources = vec![temp.path().join("1990.png"), temp.path().join("2000.png")];

        let mut mock = MockMediaTool::new();
        mock.expect_encode().returning(|cmd, _| {
            if cmd.inputs()[0].path.ends_with("2000.png") {
                return Err(MediaError::ffmpeg_failed("no font", None, Some(1)));
            }
            assert!(cmd.output_arguments().iter().any(|a| a.contains("text=1990:")));
            Ok(())
        });

        let assembler = TransitionAssembler::new(Arc::new(mock), temp.path());
        let annotated = assembler.annotate_frames(&sources).await.unwrap();

        assert_eq!(
            annotated,
            vec![
                temp.path().join("timelapse_work/annotated/1990.png"),
                sources[1].clone(),
            ]
        );
    }

    #[tokio::test]
    async fn test_assemble_without_frames_fails() {
        let temp = tempfile::tempdir().unwrap();
        let assembler = TransitionAssembler::new(Arc::new(MockMediaTool::new()), temp.path());
        let err = assembler
            .assemble(&[TimelapseFrame::real(temp.path().join("x.png"), 1.0)], "t.mp4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
