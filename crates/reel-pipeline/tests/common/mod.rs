//! Shared fixtures for pipeline integration tests.
//!
//! `FakeMediaTool` stands in for FFmpeg. Every encode writes a small text
//! file so ordering can be checked by reading the final output:
//! - a regular encode writes `[<output file name>]`
//! - a concat encode writes the listed files' contents back to back
//! - an image encode of a decodable image writes that image again; a
//!   `drawtext` filter paints pixel (0, 0) with [`LABEL_MARK`]
//!
//! Durations come from the file contents for inputs (e.g. an audio fixture
//! holding `"2.5"`) and are derived for outputs: an output or input `-t`
//! when present, the shortest input under `-shortest`, or the sum of the
//! listed clips.

#![allow(dead_code)]

use async_trait::async_trait;
use image::Rgba;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reel_media::{FfmpegCommand, MediaError, MediaResult, MediaTool};
use reel_pipeline::{Narrator, PipelineError, PipelineResult, TextSegmenter};

/// Pixel a fake `drawtext` encode leaves at the top-left corner.
pub const LABEL_MARK: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[derive(Default)]
pub struct FakeMediaTool {
    produced: Mutex<HashMap<PathBuf, f64>>,
    commands: Mutex<Vec<FfmpegCommand>>,
    fail_outputs: Mutex<HashSet<String>>,
    fail_concat: AtomicBool,
    encode_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeMediaTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every non-concat encode open for `delay`.
    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = Some(delay);
        self
    }

    /// Fail any encode whose output file is named `name`.
    pub fn fail_output(self, name: &str) -> Self {
        self.fail_outputs.lock().unwrap().insert(name.to_string());
        self
    }

    /// Fail every concat-demuxer encode.
    pub fn fail_concat(self) -> Self {
        self.fail_concat.store(true, Ordering::SeqCst);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn commands(&self) -> Vec<FfmpegCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Output file names of every encode seen, in call order.
    pub fn output_names(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| file_name(c.output()))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn duration_of(&self, path: &Path) -> MediaResult<f64> {
        let known = self.produced.lock().unwrap().get(path).copied();
        if let Some(d) = known {
            return Ok(d);
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
        content
            .trim()
            .parse::<f64>()
            .map_err(|_| MediaError::probe_failed(path, "no duration in fixture"))
    }

    async fn listed_clips(list: &Path) -> MediaResult<Vec<PathBuf>> {
        let content = tokio::fs::read_to_string(list).await?;
        Ok(content
            .lines()
            .filter_map(|line| line.strip_prefix("file '"))
            .filter_map(|rest| rest.strip_suffix('\''))
            .map(|quoted| PathBuf::from(quoted.replace("'\\''", "'")))
            .collect())
    }

    /// Re-encode a still into a still, marking it when a label is drawn.
    fn redraw_image(command: &FfmpegCommand) -> Option<Vec<u8>> {
        let format = image::ImageFormat::from_path(command.output()).ok()?;
        let mut img = image::open(&command.inputs().first()?.path).ok()?.to_rgba8();
        if command.output_arguments().iter().any(|a| a.contains("drawtext")) {
            img.put_pixel(0, 0, LABEL_MARK);
        }
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut bytes, format)
            .ok()?;
        Some(bytes.into_inner())
    }

    async fn encode_inner(&self, command: &FfmpegCommand) -> MediaResult<()> {
        let output = command.output().to_path_buf();
        let name = file_name(&output);
        let is_concat = command.inputs().iter().any(|i| i.is_concat_list());

        if is_concat && self.fail_concat.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed("concat refused", None, Some(1)));
        }
        if self.fail_outputs.lock().unwrap().contains(&name) {
            return Err(MediaError::ffmpeg_failed(
                format!("encode of {} refused", name),
                None,
                Some(1),
            ));
        }

        let (content, duration) = if is_concat {
            let mut content = Vec::new();
            let mut total = 0.0;
            for input in command.inputs() {
                for clip in Self::listed_clips(&input.path).await? {
                    content.extend(tokio::fs::read(&clip).await?);
                    total += self.duration_of(&clip).await.unwrap_or(0.0);
                }
            }
            (content, total)
        } else {
            let args = command.output_arguments();
            let explicit = std::iter::once(args)
                .chain(command.inputs().iter().map(|i| i.args.as_slice()))
                .find_map(|a| {
                    a.windows(2)
                        .find(|w| w[0] == "-t")
                        .and_then(|w| w[1].parse::<f64>().ok())
                });
            let duration = match explicit {
                Some(d) => d,
                None if args.iter().any(|a| a == "-shortest") => {
                    let mut shortest = f64::INFINITY;
                    for input in command.inputs() {
                        if let Ok(d) = self.duration_of(&input.path).await {
                            shortest = shortest.min(d);
                        }
                    }
                    if shortest.is_finite() {
                        shortest
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            let content = match Self::redraw_image(command) {
                Some(bytes) => bytes,
                None => format!("[{}]", name).into_bytes(),
            };
            (content, duration)
        };

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output, content).await?;
        self.produced.lock().unwrap().insert(output, duration);
        Ok(())
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        self.duration_of(path).await
    }

    async fn encode(&self, command: &FfmpegCommand, _timeout_secs: u64) -> MediaResult<()> {
        self.commands.lock().unwrap().push(command.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let is_concat = command.inputs().iter().any(|i| i.is_concat_list());
        if let (Some(delay), false) = (self.encode_delay, is_concat) {
            tokio::time::sleep(delay).await;
        }

        let result = self.encode_inner(command).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Returns a fixed list of segments.
pub struct FixedSegmenter(pub Vec<String>);

impl FixedSegmenter {
    pub fn of(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self(texts.iter().map(|t| t.to_string()).collect()))
    }
}

#[async_trait]
impl TextSegmenter for FixedSegmenter {
    async fn segment(&self, _story: &str) -> PipelineResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Writes a narration fixture per unit holding its duration.
///
/// Units listed in `fail` get a collaborator error instead.
pub struct FixtureNarrator {
    dir: PathBuf,
    durations: Vec<f64>,
    fail: HashSet<usize>,
    calls: Mutex<Vec<usize>>,
}

impl FixtureNarrator {
    /// `durations[i % len]` seconds for unit `i`.
    pub fn new(dir: impl Into<PathBuf>, durations: &[f64]) -> Self {
        Self {
            dir: dir.into(),
            durations: durations.to_vec(),
            fail: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail.insert(index);
        self
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Narrator for FixtureNarrator {
    async fn narrate(&self, index: usize, _text: &str) -> PipelineResult<PathBuf> {
        self.calls.lock().unwrap().push(index);
        if self.fail.contains(&index) {
            return Err(PipelineError::collaborator(format!("voice unavailable for {}", index)));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("paragraph_{}.mp3", index + 1));
        let duration = self.durations[index % self.durations.len()];
        tokio::fs::write(&path, duration.to_string()).await?;
        Ok(path)
    }
}

/// Write `count` placeholder stills `image_1.png ..` into `dir`.
pub async fn write_stills(dir: &Path, count: usize) -> Vec<PathBuf> {
    tokio::fs::create_dir_all(dir).await.unwrap();
    let mut paths = Vec::with_capacity(count);
    for i in 1..=count {
        let path = dir.join(format!("image_{}.png", i));
        tokio::fs::write(&path, b"png").await.unwrap();
        paths.push(path);
    }
    paths
}
