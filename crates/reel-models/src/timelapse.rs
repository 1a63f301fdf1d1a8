//! Time-lapse frame sequence types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default display time of a real frame in seconds.
pub const DEFAULT_MAIN_FRAME_DURATION: f64 = 1.0;
/// Default display time of an interpolated frame in seconds.
pub const DEFAULT_INTER_FRAME_DURATION: f64 = 0.03;
/// Default number of blended frames inserted between two real frames.
pub const DEFAULT_INTER_FRAMES: usize = 32;

/// One entry of a time-lapse sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelapseFrame {
    pub image_path: PathBuf,
    pub display_duration_seconds: f64,
    /// Synthetic in-between frame produced by blending two real frames
    pub is_interpolated: bool,
    /// Caption burned into the frame (e.g. the year), real frames only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TimelapseFrame {
    pub fn real(image_path: impl Into<PathBuf>, display_duration_seconds: f64) -> Self {
        Self {
            image_path: image_path.into(),
            display_duration_seconds,
            is_interpolated: false,
            label: None,
        }
    }

    pub fn interpolated(image_path: impl Into<PathBuf>, display_duration_seconds: f64) -> Self {
        Self {
            image_path: image_path.into(),
            display_duration_seconds,
            is_interpolated: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Frame timing used when building a time-lapse sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
    pub main_frame_duration: f64,
    pub inter_frame_duration: f64,
    pub inter_frames: usize,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            main_frame_duration: DEFAULT_MAIN_FRAME_DURATION,
            inter_frame_duration: DEFAULT_INTER_FRAME_DURATION,
            inter_frames: DEFAULT_INTER_FRAMES,
        }
    }
}

impl FrameTiming {
    /// Interpolated frames must always be shown for less time than real ones.
    pub fn is_valid(&self) -> bool {
        self.main_frame_duration > 0.0
            && self.inter_frame_duration > 0.0
            && (self.inter_frames == 0 || self.inter_frame_duration < self.main_frame_duration)
    }

    /// Total number of frames in a sequence built from `real_frames` real frames.
    pub fn sequence_len(&self, real_frames: usize) -> usize {
        real_frames + real_frames.saturating_sub(1) * self.inter_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_len() {
        let timing = FrameTiming {
            inter_frames: 2,
            ..Default::default()
        };
        assert_eq!(timing.sequence_len(3), 7);
        assert_eq!(timing.sequence_len(1), 1);
        assert_eq!(timing.sequence_len(0), 0);
    }

    #[test]
    fn test_timing_validation() {
        assert!(FrameTiming::default().is_valid());
        let inverted = FrameTiming {
            main_frame_duration: 0.5,
            inter_frame_duration: 1.0,
            inter_frames: 4,
        };
        assert!(!inverted.is_valid());
    }
}
