//! Pipeline run identity, lifecycle and result report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID of the form `run_<timestamp>_<short uuid>`.
    pub fn new() -> Self {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let short = Uuid::new_v4().simple().to_string();
        Self(format!("run_{}_{}", stamp, &short[..8]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a story run. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    #[default]
    Collecting,
    Reconciling,
    Rendering,
    Concatenating,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Collecting => "collecting",
            RunStage::Reconciling => "reconciling",
            RunStage::Rendering => "rendering",
            RunStage::Concatenating => "concatenating",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }

    /// Whether `next` is a legal successor of this stage.
    ///
    /// Any non-terminal stage may fail; otherwise only the immediate
    /// successor is allowed. There is no retry-in-place.
    pub fn can_advance_to(&self, next: RunStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunStage::Failed => true,
            RunStage::Collecting => false,
            _ => self.successor() == Some(next),
        }
    }

    fn successor(&self) -> Option<RunStage> {
        match self {
            RunStage::Collecting => Some(RunStage::Reconciling),
            RunStage::Reconciling => Some(RunStage::Rendering),
            RunStage::Rendering => Some(RunStage::Concatenating),
            RunStage::Concatenating => Some(RunStage::Done),
            RunStage::Done | RunStage::Failed => None,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-unit line of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub index: usize,
    pub text: String,
    pub image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Structured outcome of a run, handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub success: bool,
    /// Terminal stage: `Done` or `Failed`
    pub stage: RunStage,
    /// Stage that was running when the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<RunStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<PathBuf>,
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    /// Stable error category (e.g. "no_images_found")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(run_id: RunId, final_video: PathBuf, units: Vec<UnitRecord>) -> Self {
        Self {
            run_id,
            success: true,
            stage: RunStage::Done,
            failed_stage: None,
            final_video: Some(final_video),
            mapping_file: None,
            units,
            error_kind: None,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Report a run that failed while `failed_stage` was running.
    pub fn failed(
        run_id: RunId,
        failed_stage: RunStage,
        error_kind: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            success: false,
            stage: RunStage::Failed,
            failed_stage: Some(failed_stage),
            final_video: None,
            mapping_file: None,
            units: Vec::new(),
            error_kind: Some(error_kind.into()),
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    pub fn with_mapping_file(mut self, path: PathBuf) -> Self {
        self.mapping_file = Some(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let id = RunId::new();
        assert!(id.as_str().starts_with("run_"));
        assert_eq!(id.as_str().len(), "run_20240101_120000_".len() + 8);
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_stage_forward_only() {
        assert!(RunStage::Collecting.can_advance_to(RunStage::Reconciling));
        assert!(RunStage::Reconciling.can_advance_to(RunStage::Rendering));
        assert!(RunStage::Rendering.can_advance_to(RunStage::Concatenating));
        assert!(RunStage::Concatenating.can_advance_to(RunStage::Done));
        assert!(RunStage::Rendering.can_advance_to(RunStage::Failed));

        assert!(!RunStage::Rendering.can_advance_to(RunStage::Reconciling));
        assert!(!RunStage::Collecting.can_advance_to(RunStage::Rendering));
        assert!(!RunStage::Failed.can_advance_to(RunStage::Collecting));
        assert!(!RunStage::Done.can_advance_to(RunStage::Failed));
    }

    #[test]
    fn test_failed_report_serialization() {
        let report = RunReport::failed(
            RunId::from_string("run_x"),
            RunStage::Collecting,
            "no_images_found",
            "No images found",
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["stage"], "failed");
        assert_eq!(json["failed_stage"], "collecting");
        assert_eq!(json["error_kind"], "no_images_found");
        assert!(json.get("final_video").is_none());

        let done = RunReport::succeeded(RunId::from_string("run_y"), PathBuf::from("out.mp4"), Vec::new());
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["stage"], "done");
        assert!(json.get("failed_stage").is_none());
    }
}
