//! Shared data models for the reel assembly engine.
//!
//! This crate provides Serde-serializable types for:
//! - Narrative units and rendered segments
//! - Time-lapse frame sequences
//! - Encoding configuration, frame geometry and transitions
//! - Run identity, lifecycle stages and reports

pub mod encoding;
pub mod run;
pub mod style;
pub mod timelapse;
pub mod unit;

// Re-export common types
pub use encoding::EncodingConfig;
pub use run::{RunId, RunReport, RunStage, UnitRecord};
pub use style::{PaddingPolicy, Resolution, TransitionKind};
pub use timelapse::{FrameTiming, TimelapseFrame};
pub use unit::{NarrativeUnit, RenderedSegment, VisualKind};
