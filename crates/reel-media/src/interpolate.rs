//! In-between frames for time-lapses.
//!
//! Frames are produced by straight alpha blending of two real frames. This
//! is a crude, deterministic placeholder for real motion interpolation: it
//! cross-dissolves pixels and does not track movement.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Blend weight of the second frame for in-between frame `i` of `count`.
pub fn blend_alpha(i: usize, count: usize) -> f32 {
    i as f32 / (count + 1) as f32
}

/// `pixel = a * (1 - alpha) + b * alpha`, per channel. Both images must have
/// the same dimensions.
pub fn blend(a: &RgbaImage, b: &RgbaImage, alpha: f32) -> RgbaImage {
    RgbaImage::from_fn(a.width(), a.height(), |x, y| {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        let mut out = [0u8; 4];
        for c in 0..4 {
            let v = pa[c] as f32 * (1.0 - alpha) + pb[c] as f32 * alpha;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgba(out)
    })
}

/// File name of in-between frame `i` after the frame `stem`.
pub fn interpolated_file_name(stem: &str, i: usize) -> String {
    format!("interp_{}_{}.png", stem, i)
}

/// Write `count` blended frames between `first` and `second` into `out_dir`.
///
/// The second image is resized to the first's dimensions when they differ.
/// Returns the written paths in display order; `count == 0` writes nothing.
pub async fn interpolate_between(
    first: &Path,
    second: &Path,
    count: usize,
    out_dir: &Path,
) -> MediaResult<Vec<PathBuf>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(out_dir).await?;

    let first = first.to_path_buf();
    let second = second.to_path_buf();
    let out_dir = out_dir.to_path_buf();

    tokio::task::spawn_blocking(move || blend_to_files(&first, &second, count, &out_dir))
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
}

fn blend_to_files(first: &Path, second: &Path, count: usize, out_dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let a = image::open(first)?.to_rgba8();
    let mut b = image::open(second)?.to_rgba8();

    if a.dimensions() != b.dimensions() {
        b = image::imageops::resize(&b, a.width(), a.height(), FilterType::Lanczos3);
    }

    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "frame".to_string());

    let mut written = Vec::with_capacity(count);
    for i in 1..=count {
        let alpha = blend_alpha(i, count);
        let path = out_dir.join(interpolated_file_name(&stem, i));
        blend(&a, &b, alpha).save(&path)?;
        debug!(path = %path.display(), alpha, "Wrote interpolated frame");
        written.push(path);
    }

    Ok(written)
}
