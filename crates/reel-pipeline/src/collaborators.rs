//! Upstream collaborators: text segmentation and narration.
//!
//! The pipeline only depends on the two traits here. The implementations in
//! this module work offline; LLM- or cloud-backed services plug in through
//! the same traits.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::workspace::{list_sorted, RunWorkspace};

/// Paragraph cap for a single short.
pub const MAX_PARAGRAPHS: usize = 8;
/// A lone paragraph longer than this is split further.
pub const LARGE_BLOCK_CHARS: usize = 500;
/// Texts up to this length are never chunked.
pub const SHORT_TEXT_CHARS: usize = 100;
/// Upper bound on a fallback chunk.
pub const MAX_CHUNK_CHARS: usize = 300;

/// Audio file extensions accepted as narration.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac"];

/// Produces the ordered text segments of a story.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSegmenter: Send + Sync {
    async fn segment(&self, story: &str) -> PipelineResult<Vec<String>>;
}

/// Produces one narration audio file for a unit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Narrate `text` for the unit at `index`, returning the audio path.
    async fn narrate(&self, index: usize, text: &str) -> PipelineResult<PathBuf>;
}

/// Collaborator handles shared by a run.
#[derive(Clone)]
pub struct Collaborators {
    pub segmenter: Arc<dyn TextSegmenter>,
    pub narrator: Arc<dyn Narrator>,
}

/// Splits a story locally, without a language model.
#[derive(Debug, Clone, Default)]
pub struct ParagraphSegmenter {
    sentence_mapping: Option<PathBuf>,
}

impl ParagraphSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer sentences from a `Sentence N: ... Image:` mapping file when it
    /// exists and contains any.
    pub fn with_sentence_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.sentence_mapping = Some(path.into());
        self
    }
}

#[async_trait]
impl TextSegmenter for ParagraphSegmenter {
    async fn segment(&self, story: &str) -> PipelineResult<Vec<String>> {
        if let Some(path) = &self.sentence_mapping {
            if let Ok(content) = tokio::fs::read_to_string(path).await {
                let sentences = parse_sentence_mapping(&content);
                if !sentences.is_empty() {
                    info!(count = sentences.len(), "Using sentences from mapping file");
                    return Ok(sentences);
                }
            }
        }

        Ok(segment_text(story))
    }
}

/// Paragraphs first; a single large block (or nothing) falls back to
/// sentences, and an empty paragraph split with no usable sentences falls
/// back to fixed-size chunks.
pub fn segment_text(text: &str) -> Vec<String> {
    let mut segments = split_paragraphs(text);

    if segments.is_empty() || (segments.len() == 1 && segments[0].chars().count() > LARGE_BLOCK_CHARS) {
        let sentences = split_sentences(text);
        if sentences.len() > 1 {
            debug!(count = sentences.len(), "Split story into sentences");
            segments = sentences;
        } else if segments.is_empty() {
            segments = chunk_text(text);
        }
    }

    segments
}

/// Blank-line separated paragraphs, at most [`MAX_PARAGRAPHS`].
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_PARAGRAPHS)
        .map(str::to_string)
        .collect()
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"))
}

fn sentence_mapping_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Sentence \d+:\s*(.+?)\nImage:").expect("mapping pattern is valid")
    })
}

/// Sentences ending in `.`, `!` or `?`. Returns nothing unless the text
/// holds at least two.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_boundary().find_iter(text) {
        // The punctuation is one ASCII byte
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    let sentences: Vec<String> = sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if sentences.len() > 1 {
        sentences
    } else {
        Vec::new()
    }
}

/// Two to four roughly equal chunks of at most [`MAX_CHUNK_CHARS`]
/// characters. Short texts are kept whole.
pub fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SHORT_TEXT_CHARS {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let target = (chars.len() / 150).clamp(2, 4);
    let chunk_size = chars.len().div_ceil(target).min(MAX_CHUNK_CHARS);

    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect::<String>().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Sentences from a `sentence_image_mapping.txt` file.
pub fn parse_sentence_mapping(content: &str) -> Vec<String> {
    sentence_mapping_block()
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// File name of the narration written for a unit.
pub fn paragraph_audio_file_name(index: usize) -> String {
    format!("paragraph_{}.mp3", index + 1)
}

/// Runs an external TTS command per unit.
///
/// The template is split with POSIX shell quoting rules; `{text}` and
/// `{output}` are substituted inside each argument afterwards, so the text
/// reaches the command as data and is never interpreted by a shell.
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    template: Vec<String>,
    output_dir: PathBuf,
    timeout_secs: u64,
}

impl CommandNarrator {
    pub fn new(template: &str, output_dir: impl Into<PathBuf>, timeout_secs: u64) -> PipelineResult<Self> {
        let template = shell_words::split(template)
            .map_err(|e| PipelineError::config(format!("TTS command template: {}", e)))?;
        if template.is_empty() {
            return Err(PipelineError::config("TTS command template is empty"));
        }
        if !template.iter().any(|a| a.contains("{output}")) {
            return Err(PipelineError::config("TTS command template must contain {output}"));
        }
        Ok(Self {
            template,
            output_dir: output_dir.into(),
            timeout_secs,
        })
    }

    /// Program and arguments for one narration.
    pub fn build_args(&self, text: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.template
            .iter()
            .map(|a| a.replace("{text}", text).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl Narrator for CommandNarrator {
    async fn narrate(&self, index: usize, text: &str) -> PipelineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(paragraph_audio_file_name(index));
        let args = self.build_args(text, &output);

        debug!(index, program = %args[0], "Running narration command");

        let child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child)
            .await
            .map_err(|_| {
                PipelineError::collaborator(format!(
                    "narration for unit {} timed out after {}s",
                    index, self.timeout_secs
                ))
            })??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::collaborator(format!(
                "narration for unit {} failed: {}",
                index,
                stderr.trim()
            )));
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Ok(output),
            _ => Err(PipelineError::collaborator(format!(
                "narration for unit {} produced no audio at {}",
                index,
                output.display()
            ))),
        }
    }
}

/// Pairs units by position with audio files that already exist.
#[derive(Debug, Clone)]
pub struct PrerecordedNarrator {
    files: Vec<PathBuf>,
}

impl PrerecordedNarrator {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Sorted audio files from `audio/`, or `paragraph_audio/` when the
    /// former holds none.
    pub async fn discover(workspace: &RunWorkspace) -> PipelineResult<Self> {
        let is_audio = |p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        };

        let mut files = list_sorted(&workspace.audio_dir(), is_audio).await?;
        if files.is_empty() {
            files = list_sorted(&workspace.paragraph_audio_dir(), is_audio).await?;
        }
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl Narrator for PrerecordedNarrator {
    async fn narrate(&self, index: usize, _text: &str) -> PipelineResult<PathBuf> {
        self.files
            .get(index)
            .cloned()
            .ok_or_else(|| PipelineError::collaborator(format!("no recorded audio for unit {}", index)))
    }
}
