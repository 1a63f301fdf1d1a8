//! Pipeline configuration.

use std::path::PathBuf;

use reel_media::ToolTimeouts;
use reel_models::{EncodingConfig, PaddingPolicy, Resolution};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base directory for new run workspaces
    pub work_dir: PathBuf,
    /// Output frame size
    pub resolution: Resolution,
    /// How stills are padded to the frame
    pub padding: PaddingPolicy,
    /// Maximum concurrent segment renders within a run
    pub max_parallel_renders: usize,
    /// Per-invocation bounds for external tools
    pub timeouts: ToolTimeouts,
    /// External narration command template (`{text}`, `{output}`)
    pub tts_command: Option<String>,
    /// Encoder settings shared by every encode
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./runs"),
            resolution: Resolution::default(),
            padding: PaddingPolicy::default(),
            max_parallel_renders: 4,
            timeouts: ToolTimeouts::default(),
            tts_command: None,
            encoding: EncodingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_timeouts = defaults.timeouts;

        let encoding = EncodingConfig::default()
            .with_crf(env_parse("REEL_CRF").unwrap_or(defaults.encoding.crf))
            .with_audio_bitrate(
                std::env::var("REEL_AUDIO_BITRATE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| defaults.encoding.audio_bitrate.clone()),
            );

        Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            resolution: env_parse("REEL_RESOLUTION").unwrap_or(defaults.resolution),
            padding: env_parse("REEL_PADDING").unwrap_or(defaults.padding),
            max_parallel_renders: env_parse::<usize>("REEL_MAX_PARALLEL_RENDERS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_parallel_renders),
            timeouts: ToolTimeouts {
                probe_secs: env_parse("REEL_PROBE_TIMEOUT_SECS")
                    .unwrap_or(default_timeouts.probe_secs),
                render_secs: env_parse("REEL_RENDER_TIMEOUT_SECS")
                    .unwrap_or(default_timeouts.render_secs),
                concat_secs: env_parse("REEL_CONCAT_TIMEOUT_SECS")
                    .unwrap_or(default_timeouts.concat_secs),
                merge_secs: env_parse("REEL_MERGE_TIMEOUT_SECS")
                    .unwrap_or(default_timeouts.merge_secs),
                transition_secs: env_parse("REEL_TRANSITION_TIMEOUT_SECS")
                    .unwrap_or(default_timeouts.transition_secs),
            },
            tts_command: std::env::var("REEL_TTS_COMMAND")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            encoding,
        }
    }
}
