//! Frame geometry, padding policy and transition definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Vertical 9:16 frame used for shorts.
    pub const SHORTS: Resolution = Resolution {
        width: 1080,
        height: 1920,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::SHORTS
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X', ':'])
            .ok_or_else(|| ResolutionParseError(s.to_string()))?;
        let width: u32 = w.parse().map_err(|_| ResolutionParseError(s.to_string()))?;
        let height: u32 = h.parse().map_err(|_| ResolutionParseError(s.to_string()))?;
        // libx264 with 4:2:0 chroma needs even dimensions
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(ResolutionParseError(s.to_string()));
        }
        Ok(Resolution { width, height })
    }
}

#[derive(Debug, Error)]
#[error("Invalid resolution (expected even WIDTHxHEIGHT): {0}")]
pub struct ResolutionParseError(String);

/// How a still image is fitted into the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Fill the frame with a blurred, scaled copy of the same image
    #[default]
    BlurredBackground,
    /// Plain black bars
    Black,
}

impl PaddingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaddingPolicy::BlurredBackground => "blur",
            PaddingPolicy::Black => "black",
        }
    }
}

impl fmt::Display for PaddingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaddingPolicy {
    type Err = PaddingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blur" | "blurred" | "blurred_background" => Ok(PaddingPolicy::BlurredBackground),
            "black" | "pad" => Ok(PaddingPolicy::Black),
            _ => Err(PaddingParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown padding policy: {0}")]
pub struct PaddingParseError(String);

/// Crossfade effect used between two time-lapse frames.
///
/// Each variant maps to an FFmpeg `xfade` transition name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    #[default]
    Dissolve,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    CircleOpen,
    Pixelize,
}

impl TransitionKind {
    pub const ALL: &'static [TransitionKind] = &[
        TransitionKind::Fade,
        TransitionKind::Dissolve,
        TransitionKind::WipeLeft,
        TransitionKind::WipeRight,
        TransitionKind::WipeUp,
        TransitionKind::WipeDown,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::CircleOpen,
        TransitionKind::Pixelize,
    ];

    /// Name understood by the `xfade` filter.
    pub fn as_xfade_name(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::WipeUp => "wipeup",
            TransitionKind::WipeDown => "wipedown",
            TransitionKind::SlideLeft => "slideleft",
            TransitionKind::SlideRight => "slideright",
            TransitionKind::CircleOpen => "circleopen",
            TransitionKind::Pixelize => "pixelize",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_xfade_name())
    }
}

impl FromStr for TransitionKind {
    type Err = TransitionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace(['_', '-'], "");
        TransitionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_xfade_name() == normalized)
            .ok_or_else(|| TransitionParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown transition: {0}")]
pub struct TransitionParseError(String);
