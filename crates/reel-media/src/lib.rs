#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for reel assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with per-input arguments
//! - Timeout-bounded process execution and duration probing
//! - The mockable `MediaTool` boundary
//! - Segment rendering, looping, audio merging and concatenation
//! - Time-lapse assembly with crossfades and blended in-between frames

pub mod command;
pub mod concat;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod interpolate;
pub mod looping;
pub mod merge;
pub mod probe;
pub mod segment;
pub mod tool;
pub mod transition;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use concat::{ConcatMode, Concatenation, SegmentConcatenator};
pub use error::{MediaError, MediaResult};
pub use interpolate::interpolate_between;
pub use looping::{loop_count, LoopExpander, LoopedVideo};
pub use merge::{AudioVideoMerger, MergedVideo};
pub use probe::probe_duration;
pub use segment::{segment_file_name, SegmentRenderer};
pub use tool::{FfmpegTool, MediaTool, ToolTimeouts};
pub use transition::{
    plan_sequence, SequenceItem, TimelapseOutput, TransitionAssembler, TransitionSettings,
};
