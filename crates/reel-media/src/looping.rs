//! Repeat a short clip until it covers a target duration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_non_empty, remove_scratch, write_concat_list};
use crate::tool::MediaTool;

/// Whole repetitions of a clip of `input_duration` needed to reach
/// `target_duration`. Always at least one.
pub fn loop_count(target_duration: f64, input_duration: f64) -> usize {
    if input_duration <= 0.0 || !target_duration.is_finite() || target_duration <= 0.0 {
        return 1;
    }
    (target_duration / input_duration).ceil().max(1.0) as usize
}

/// Result of a loop expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopedVideo {
    pub path: PathBuf,
    pub loop_count: usize,
    /// `loop_count * input_duration`; may exceed the requested target
    pub duration_seconds: f64,
}

/// Builds longer clips out of literal repetitions of a short one.
#[derive(Clone)]
pub struct LoopExpander {
    tool: Arc<dyn MediaTool>,
    timeout_secs: u64,
}

impl LoopExpander {
    pub fn new(tool: Arc<dyn MediaTool>, timeout_secs: u64) -> Self {
        Self { tool, timeout_secs }
    }

    /// Stream-copy `ceil(target / input)` repetitions of `input` into `output`.
    pub async fn expand(
        &self,
        input: &Path,
        target_duration: f64,
        output: &Path,
    ) -> MediaResult<LoopedVideo> {
        ensure_non_empty(input).await?;

        let input_duration = self.tool.probe_duration(input).await?;
        if input_duration <= 0.0 {
            return Err(MediaError::InvalidDuration {
                path: input.to_path_buf(),
                duration: input_duration,
            });
        }

        let count = loop_count(target_duration, input_duration);
        info!(
            path = %input.display(),
            input_duration,
            target_duration,
            loops = count,
            "Creating looped video"
        );

        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let list_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let list_path = list_dir.join(format!("loop_list_{}.txt", stem));

        let repeats = vec![input.to_path_buf(); count];
        write_concat_list(&list_path, &repeats).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .concat_list()
            .codec_copy();

        debug!(output = %output.display(), "Running loop concatenation");
        let result = self.tool.encode(&cmd, self.timeout_secs).await;

        // Keep the list on failure so the step can be reproduced by hand
        if result.is_ok() {
            remove_scratch(&list_path).await;
        }
        result?;

        Ok(LoopedVideo {
            path: output.to_path_buf(),
            loop_count: count,
            duration_seconds: count as f64 * input_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockMediaTool;

    #[test]
    fn test_loop_count() {
        assert_eq!(loop_count(10.0, 3.0), 4);
        assert_eq!(loop_count(9.0, 3.0), 3);
        assert_eq!(loop_count(1.0, 3.0), 1);
        assert_eq!(loop_count(0.0, 3.0), 1);
        assert_eq!(loop_count(5.0, 0.0), 1);
    }

    #[test]
    fn test_loop_count_always_covers_target() {
        for target in [0.1, 1.0, 2.5, 7.3, 12.0, 59.99] {
            for input in [0.4, 1.0, 2.2, 5.0] {
                let n = loop_count(target, input);
                assert!(n as f64 * input >= target, "{} x {} < {}", n, input, target);
            }
        }
    }

    #[tokio::test]
    async fn test_expand_writes_repetitions() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("clip.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();
        let output = temp.path().join("looped_video_1.mp4");

        let mut mock = MockMediaTool::new();
        mock.expect_probe_duration().returning(|_| Ok(2.0));
        mock.expect_encode().times(1).returning(|cmd, _| {
            let list = &cmd.inputs()[0];
            assert!(list.is_concat_list());
            let content = std::fs::read_to_string(&list.path).unwrap();
            assert_eq!(content.lines().count(), 3);
            std::fs::write(cmd.output(), b"looped").unwrap();
            Ok(())
        });

        let expander = LoopExpander::new(Arc::new(mock), 120);
        let looped = expander.expand(&input, 5.0, &output).await.unwrap();

        assert_eq!(looped.loop_count, 3);
        assert!(looped.duration_seconds >= 5.0);
        assert!(!temp.path().join("loop_list_looped_video_1.txt").exists());
    }

    #[tokio::test]
    async fn test_expand_rejects_zero_duration() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("clip.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let mut mock = MockMediaTool::new();
        mock.expect_probe_duration().returning(|_| Ok(0.0));
        mock.expect_encode().never();

        let expander = LoopExpander::new(Arc::new(mock), 120);
        let err = expander
            .expand(&input, 5.0, &temp.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidDuration { .. }));
    }
}
