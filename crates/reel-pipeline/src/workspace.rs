//! Per-run workspace directory.
//!
//! A workspace is owned by exactly one run and is never cleaned up, so the
//! intermediate files stay available for inspection.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

use reel_models::{RunId, RunReport, VisualKind};

use crate::error::{PipelineError, PipelineResult};

pub const IMAGES_DIR: &str = "images";
pub const AUDIO_DIR: &str = "audio";
pub const PARAGRAPH_AUDIO_DIR: &str = "paragraph_audio";
pub const SEGMENTS_DIR: &str = "segments";
pub const TIMELAPSE_IMAGES_DIR: &str = "timelapse_images";

pub const FINAL_VIDEO_FILE: &str = "output_story_video.mp4";
pub const MAPPING_FILE: &str = "paragraph_mapping.txt";
pub const REPORT_FILE: &str = "run_report.json";
pub const SENTENCE_MAPPING_FILE: &str = "sentence_image_mapping.txt";

/// A run directory with its well-known layout.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    run_id: RunId,
    root: PathBuf,
}

impl RunWorkspace {
    /// Create `<base>/run_<timestamp>_<short uuid>` with its subdirectories.
    pub async fn create(base: impl AsRef<Path>) -> PipelineResult<Self> {
        let run_id = RunId::new();
        let root = base.as_ref().join(run_id.as_str());

        for dir in [IMAGES_DIR, PARAGRAPH_AUDIO_DIR, SEGMENTS_DIR] {
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }

        debug!(path = %root.display(), "Created run workspace");
        Ok(Self { run_id, root })
    }

    /// Attach to an existing run directory. The run id is the directory name.
    pub async fn open(root: impl AsRef<Path>) -> PipelineResult<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&root).await.map_err(|_| {
            PipelineError::invalid_input(format!("run directory not found: {}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(PipelineError::invalid_input(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "run".to_string());

        Ok(Self {
            run_id: RunId::from_string(name),
            root,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_DIR)
    }

    pub fn paragraph_audio_dir(&self) -> PathBuf {
        self.root.join(PARAGRAPH_AUDIO_DIR)
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.root.join(SEGMENTS_DIR)
    }

    pub fn timelapse_images_dir(&self) -> PathBuf {
        self.root.join(TIMELAPSE_IMAGES_DIR)
    }

    pub fn final_video_path(&self) -> PathBuf {
        self.root.join(FINAL_VIDEO_FILE)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.root.join(MAPPING_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn sentence_mapping_path(&self) -> PathBuf {
        self.root.join(SENTENCE_MAPPING_FILE)
    }

    /// Still images and motion clips in `images/`, in natural file-name order.
    pub async fn collect_visuals(&self) -> PipelineResult<Vec<PathBuf>> {
        list_sorted(&self.images_dir(), |p| VisualKind::from_path(p).is_some()).await
    }

    /// Write the run report as pretty JSON.
    pub async fn write_report(&self, report: &RunReport) -> PipelineResult<PathBuf> {
        let path = self.report_path();
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Files in `dir` accepted by `keep`, in natural file-name order. A missing
/// directory yields an empty list.
pub async fn list_sorted<F>(dir: &Path, keep: F) -> PipelineResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && keep(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Compare names so that digit runs order numerically (`image_2` < `image_10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        s.push(c);
        it.next();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_natural_cmp() {
        let mut names = vec!["image_10.png", "image_2.png", "image_1.png", "cover.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["cover.png", "image_1.png", "image_2.png", "image_10.png"]);
        assert_eq!(natural_cmp("a01", "a1"), "a01".cmp("a1"));
    }

    #[tokio::test]
    async fn test_create_layout() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path()).await.unwrap();

        assert!(ws.root().starts_with(temp.path()));
        assert!(ws.run_id().as_str().starts_with("run_"));
        assert!(ws.images_dir().is_dir());
        assert!(ws.paragraph_audio_dir().is_dir());
        assert!(ws.segments_dir().is_dir());
        assert!(ws.final_video_path().ends_with("output_story_video.mp4"));

        let reopened = tokio_test::assert_ok!(RunWorkspace::open(ws.root()).await);
        assert_eq!(reopened.run_id(), ws.run_id());
    }

    #[tokio::test]
    async fn test_open_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let err = tokio_test::assert_err!(RunWorkspace::open(temp.path().join("nope")).await);
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_collect_visuals_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path()).await.unwrap();
        for name in ["image_10.png", "image_2.jpg", "clip_1.mp4", "notes.txt"] {
            tokio::fs::write(ws.images_dir().join(name), b"x").await.unwrap();
        }

        let visuals = ws.collect_visuals().await.unwrap();
        let names: Vec<String> = visuals.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["clip_1.mp4", "image_2.jpg", "image_10.png"]);
    }
}
