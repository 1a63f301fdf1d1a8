//! Plain-text audit record of a story run.

use std::fmt::Write as _;
use std::path::Path;

use reel_models::UnitRecord;

use crate::error::PipelineResult;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render the mapping file: the story, then one block per final unit with
/// its text, image and audio file names and the segment path relative to
/// the run directory.
pub fn render_mapping(story: &str, units: &[UnitRecord], run_root: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Original Story: {}\n", story);

    for (i, unit) in units.iter().enumerate() {
        let _ = writeln!(out, "--- Segment {} ---", i + 1);
        let _ = writeln!(out, "Text: {}", unit.text);
        let _ = writeln!(out, "Image: {}", file_name(&unit.image));
        if let Some(audio) = &unit.audio {
            let _ = writeln!(out, "Audio: {}", file_name(audio));
        }
        if let Some(segment) = &unit.segment {
            let rel = segment.strip_prefix(run_root).unwrap_or(segment);
            let _ = writeln!(out, "Video Segment: {}", rel.display());
        }
        out.push('\n');
    }

    out
}

pub async fn write_mapping(
    path: &Path,
    story: &str,
    units: &[UnitRecord],
    run_root: &Path,
) -> PipelineResult<()> {
    tokio::fs::write(path, render_mapping(story, units, run_root)).await?;
    Ok(())
}
