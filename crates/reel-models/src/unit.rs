//! Narrative units and the segments rendered from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extensions treated as still images.
pub const STILL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// File extensions treated as generated motion clips.
pub const MOTION_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Kind of visual source backing a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    /// Single image looped for the narration length
    Still,
    /// Short generated video, looped and merged with the narration
    Motion,
}

impl VisualKind {
    /// Classify a path by its extension. Returns `None` for unsupported files.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        if STILL_EXTENSIONS.contains(&ext.as_str()) {
            Some(VisualKind::Still)
        } else if MOTION_EXTENSIONS.contains(&ext.as_str()) {
            Some(VisualKind::Motion)
        } else {
            None
        }
    }
}

/// One (text, visual, audio) triple of the final video.
///
/// `audio_path` and `duration_seconds` are filled in as narration completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeUnit {
    /// Zero-based position in narrative order
    pub index: usize,
    pub text: String,
    pub image_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl NarrativeUnit {
    pub fn new(index: usize, text: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            text: text.into(),
            image_path: image_path.into(),
            audio_path: None,
            duration_seconds: None,
        }
    }

    /// Attach narration audio and its probed duration.
    pub fn with_narration(mut self, audio_path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        self.audio_path = Some(audio_path.into());
        self.duration_seconds = Some(duration_seconds);
        self
    }

    /// A unit is renderable once it has audio with a positive duration.
    pub fn is_narrated(&self) -> bool {
        self.audio_path.is_some() && self.duration_seconds.is_some_and(|d| d > 0.0)
    }

    pub fn visual_kind(&self) -> VisualKind {
        VisualKind::from_path(&self.image_path).unwrap_or(VisualKind::Still)
    }
}

/// A rendered clip. Never mutated after creation; consumed by concatenation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSegment {
    pub index: usize,
    pub file_path: PathBuf,
    pub duration_seconds: f64,
}

impl RenderedSegment {
    pub fn new(index: usize, file_path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        Self {
            index,
            file_path: file_path.into(),
            duration_seconds,
        }
    }
}
