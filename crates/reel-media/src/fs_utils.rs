//! Filesystem helpers shared by the media components.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Fail with `FileNotFound` or `EmptyFile` unless `path` is a non-empty file.
pub async fn ensure_non_empty(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    let meta = fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    if meta.len() == 0 {
        return Err(MediaError::EmptyFile(path.to_path_buf()));
    }
    Ok(())
}

/// Whether `path` is an existing, non-empty file.
pub async fn is_valid_clip(path: impl AsRef<Path>) -> bool {
    ensure_non_empty(path).await.is_ok()
}

/// Make a path absolute against the current directory.
pub fn absolute_path(path: &Path) -> MediaResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Quote a path for a concat-demuxer list line.
pub fn concat_list_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Write a concat-demuxer list file referencing each clip by absolute path,
/// preserving order.
pub async fn write_concat_list(list_path: &Path, clips: &[PathBuf]) -> MediaResult<()> {
    let mut content = String::new();
    for clip in clips {
        content.push_str(&concat_list_line(&absolute_path(clip)?));
        content.push('\n');
    }

    if let Some(parent) = list_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(list_path, content).await?;
    Ok(())
}

/// Copy `src` to `dst` through a temporary file in the destination
/// directory, so `dst` is either absent or complete.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_dst);
        tracing::error!(
            "Failed to rename temp file: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    Ok(())
}

/// Remove a scratch file, logging rather than failing.
pub async fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::debug!("Could not remove scratch file {}: {}", path.display(), e);
    }
}
