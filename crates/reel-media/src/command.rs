//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use reel_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};

/// Number of stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One `-i` input together with the arguments that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// Arguments placed before this input's `-i`
    pub args: Vec<String>,
    pub path: PathBuf,
}

impl FfmpegInput {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Whether this input is a concat-demuxer list file.
    pub fn is_concat_list(&self) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == "-f" && pair[1] == "concat")
    }
}

/// Builder for FFmpeg commands.
///
/// Input arguments always apply to the most recently added input, so a
/// command reads in the same order as the resulting argument list:
///
/// ```ignore
/// FfmpegCommand::new("image.png", "out.mp4")
///     .loop_input()
///     .add_input("narration.mp3")
///     .shortest();
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Everything between the last input and the output path
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput::new(input)],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Append another input.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput::new(input));
        self
    }

    /// Add an argument before the most recently added input's -i.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(input) = self.inputs.last_mut() {
            input.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Loop the current input (single-image sources).
    pub fn loop_input(self) -> Self {
        self.input_arg("-loop").input_arg("1")
    }

    /// Read the current input as a concat-demuxer list file.
    pub fn concat_list(self) -> Self {
        self.input_args(["-f", "concat", "-safe", "0"])
    }

    /// Limit how much of the current input is read.
    pub fn input_duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set explicit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Select a stream for the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy every stream without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set encoder tuning.
    pub fn tune(self, tune: impl Into<String>) -> Self {
        self.output_arg("-tune").output_arg(tune)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set output frame rate.
    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Stop when the shortest input stream ends.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Apply the video encoder settings of an encoding config.
    pub fn video_encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.video_args())
    }

    /// Apply the audio encoder settings of an encoding config.
    pub fn audio_encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.audio_args())
    }

    /// Inputs in `-i` order.
    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    /// Output file path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Output arguments, in order.
    pub fn output_arguments(&self) -> &[String] {
        &self.output_args
    }

    /// Full argument list, always overwriting the output and logging
    /// errors only.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-v", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Spawns `ffmpeg` for a built command.
///
/// A started encode is never cancelled from outside. It ends by exiting
/// or by being killed once the timeout elapses.
#[derive(Debug, Default, Clone)]
pub struct FfmpegRunner {
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command. Success requires exit code 0 and a
    /// non-empty output file.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(output = %cmd.output().display(), "ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;

        // Keep only the tail so a chatty encoder can't grow memory unbounded
        let stderr_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        let status = result?;
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with non-zero status writing {}", cmd.output().display()),
                Some(stderr_tail),
                status.code(),
            ));
        }

        verify_output(cmd.output()).await
    }

    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let Some(timeout_secs) = self.timeout_secs else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(timeout_secs, "Encode exceeded its time limit, killing ffmpeg");
                let _ = child.kill().await;
                Err(MediaError::Timeout(timeout_secs))
            }
        }
    }
}

/// Ensure an encoder actually produced a usable file.
pub async fn verify_output(path: &Path) -> MediaResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(MediaError::ffmpeg_failed(
            format!("FFmpeg produced an empty file: {}", path.display()),
            None,
            Some(0),
        )),
        Err(_) => Err(MediaError::ffmpeg_failed(
            format!("FFmpeg produced no output file: {}", path.display()),
            None,
            Some(0),
        )),
    }
}

/// Locate `ffmpeg` on PATH.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Locate `ffprobe` on PATH.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], needle: &str) -> usize {
        args.iter().position(|a| a == needle).unwrap()
    }

    #[test]
    fn test_global_flags_and_output_last() {
        let cmd = FfmpegCommand::new("still.png", "clip.mp4")
            .input_duration(10.0)
            .video_codec("libx264");

        let args = cmd.build_args();
        assert_eq!(&args[..4], ["-y", "-hide_banner", "-v", "error"]);
        assert!(position(&args, "10.000") < position(&args, "still.png"));
        assert!(position(&args, "libx264") > position(&args, "still.png"));
        assert_eq!(args.last().unwrap(), "clip.mp4");
    }

    #[test]
    fn test_input_args_attach_to_latest_input() {
        let cmd = FfmpegCommand::new("image.png", "out.mp4")
            .loop_input()
            .add_input("voice.mp3")
            .shortest();

        let args = cmd.build_args();
        let loop_pos = position(&args, "-loop");
        let image_pos = position(&args, "image.png");
        let voice_pos = position(&args, "voice.mp3");
        assert!(loop_pos < image_pos);
        assert!(image_pos < voice_pos);
        assert!(position(&args, "-shortest") > voice_pos);

        assert_eq!(cmd.inputs().len(), 2);
        assert_eq!(cmd.inputs()[0].args, vec!["-loop", "1"]);
        assert!(cmd.inputs()[1].args.is_empty());
    }

    #[test]
    fn test_concat_list_input() {
        let cmd = FfmpegCommand::new("list.txt", "joined.mp4").concat_list().codec_copy();
        assert!(cmd.inputs()[0].is_concat_list());

        let args = cmd.build_args();
        assert!(position(&args, "concat") < position(&args, "list.txt"));
        assert!(position(&args, "copy") > position(&args, "list.txt"));
    }

    #[test]
    fn test_encoding_settings() {
        let encoding = EncodingConfig::default();
        let cmd = FfmpegCommand::new("a.png", "b.mp4")
            .video_encoding(&encoding)
            .audio_encoding(&encoding);
        let out = cmd.output_arguments();
        assert!(out.contains(&"yuv420p".to_string()));
        assert!(out.contains(&"aac".to_string()));
    }

    #[tokio::test]
    async fn test_verify_output() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        assert!(verify_output(&missing).await.is_err());

        let empty = dir.path().join("empty.mp4");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(verify_output(&empty).await.is_err());

        let good = dir.path().join("good.mp4");
        tokio::fs::write(&good, b"data").await.unwrap();
        assert!(verify_output(&good).await.is_ok());
    }
}
