//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No images found in {0}")]
    NoImagesFound(String),

    #[error("No text segments produced")]
    NoTextSegments,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Narration failed for every unit")]
    AllNarrationFailed,

    #[error("Rendering failed for every unit")]
    AllRendersFailed,

    #[error("Concatenation failed: {0}")]
    Concatenation(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable category name recorded in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoImagesFound(_) => "no_images_found",
            PipelineError::NoTextSegments => "no_text_segments",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::AllNarrationFailed => "all_narration_failed",
            PipelineError::AllRendersFailed => "all_renders_failed",
            PipelineError::Concatenation(_) => "concatenation_failed",
            PipelineError::Collaborator(_) => "collaborator_failed",
            PipelineError::Config(_) => "config_error",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Media(_) => "media_error",
            PipelineError::Io(_) => "io_error",
            PipelineError::Json(_) => "json_error",
        }
    }

    /// Precondition failures are reported immediately and never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::NoImagesFound(_)
                | PipelineError::NoTextSegments
                | PipelineError::InvalidInput(_)
        )
    }

    /// Failures caused by every unit being dropped.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            PipelineError::AllNarrationFailed
                | PipelineError::AllRendersFailed
                | PipelineError::Concatenation(_)
        )
    }

    /// Coarse failure class used in logs and metrics.
    pub fn category(&self) -> &'static str {
        if self.is_precondition() {
            "precondition"
        } else if self.is_aggregate() {
            "aggregate"
        } else {
            "fatal"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PipelineError::NoImagesFound("x".into()).kind(), "no_images_found");
        assert_eq!(PipelineError::AllNarrationFailed.kind(), "all_narration_failed");
        assert!(PipelineError::NoTextSegments.is_precondition());
        assert!(PipelineError::AllRendersFailed.is_aggregate());
        assert!(!PipelineError::Cancelled.is_aggregate());

        assert_eq!(PipelineError::NoTextSegments.category(), "precondition");
        assert_eq!(PipelineError::Concatenation("x".into()).category(), "aggregate");
        assert_eq!(PipelineError::Cancelled.category(), "fatal");
    }
}
