//! Structured run logging.
//!
//! Provides consistent, structured logging for pipeline runs with tracing
//! spans, plus the unit counters recorded through `metrics`.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{RunId, RunStage};

/// Counter of segments rendered successfully.
pub const SEGMENTS_RENDERED_TOTAL: &str = "reel_segments_rendered_total";
/// Counter of units dropped after a soft failure, labelled by stage.
pub const UNITS_DROPPED_TOTAL: &str = "reel_units_dropped_total";
/// Counter of failed runs, labelled by error kind and category.
pub const RUNS_FAILED_TOTAL: &str = "reel_runs_failed_total";

/// Initialise the global subscriber: human-readable by default, JSON when
/// `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel=info,reel_pipeline=info,reel_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Record one successfully rendered segment.
pub fn record_segment_rendered() {
    metrics::counter!(SEGMENTS_RENDERED_TOTAL).increment(1);
}

/// Record units dropped at `stage`.
pub fn record_units_dropped(stage: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!(UNITS_DROPPED_TOTAL, "stage" => stage).increment(count as u64);
    }
}

/// Record a failed run.
pub fn record_run_failed(kind: &'static str, category: &'static str) {
    metrics::counter!(RUNS_FAILED_TOTAL, "kind" => kind, "category" => category).increment(1);
}

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a new logger for a run and operation (e.g. "story", "timelapse").
    pub fn new(run_id: &RunId, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    /// Log a failed run with its error classification.
    pub fn log_failure(&self, stage: RunStage, kind: &str, category: &str, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            stage = %stage,
            kind,
            category,
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}
