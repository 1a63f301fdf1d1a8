//! Video encoding configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_PRESET: &str = "medium";
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate for narration tracks
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Pixel format playable by common players (4:2:0 chroma)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Output frame rate for generated clips
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Encoder settings shared by every FFmpeg invocation of a run.
///
/// Missing fields deserialize to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// x264 constant rate factor, 0-51, lower is higher quality
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pixel_format: String,
    pub frame_rate: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl EncodingConfig {
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }

    /// `-c:v`, `-preset`, `-crf` and `-pix_fmt` output arguments.
    pub fn video_args(&self) -> Vec<String> {
        [
            ("-c:v", self.codec.clone()),
            ("-preset", self.preset.clone()),
            ("-crf", self.crf.to_string()),
            ("-pix_fmt", self.pixel_format.clone()),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value])
        .collect()
    }

    /// `-c:a` and `-b:a` output arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}
