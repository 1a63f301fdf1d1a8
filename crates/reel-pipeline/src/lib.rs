//! Story and time-lapse assembly pipelines.
//!
//! This crate orchestrates the media components:
//! - Run workspaces with a fixed on-disk layout
//! - Count reconciliation between text segments and visuals
//! - Narration, bounded-parallel rendering and concatenation
//! - Mapping and JSON run reports
//! - Time-lapse frame sequencing

pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod reconcile;
pub mod story;
pub mod timelapse;
pub mod workspace;

pub use collaborators::{
    Collaborators, CommandNarrator, Narrator, ParagraphSegmenter, PrerecordedNarrator, TextSegmenter,
};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::{init_tracing, RunLogger};
pub use reconcile::{align_units, reconcile_counts, ReconcilePolicy};
pub use story::{StoryOutput, StoryPipeline};
pub use timelapse::{build_frame_sequence, TimelapseOptions, TimelapsePipeline};
pub use workspace::RunWorkspace;
