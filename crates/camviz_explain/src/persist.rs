//! Heatmap persistence and output directory housekeeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use camviz_core::HeatmapFormat;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// Where a heatmap was written and how to refer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapRef {
    /// File system path.
    pub path: PathBuf,
    /// URL-style reference, `<prefix>/<file name>`.
    pub url: String,
}

/// Name of the heatmap file for an image and class.
///
/// `gradcam_<stem>_<label>.<ext>`, where `<stem>` is the file name part of
/// `identifying_name` up to its first `.`. Path separators in the label are
/// replaced by `_`.
pub fn heatmap_file_name(identifying_name: &str, label: &str, format: HeatmapFormat) -> String {
    let file = Path::new(identifying_name)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(identifying_name);
    let stem = file.split('.').next().unwrap_or_default();
    format!(
        "gradcam_{}_{}.{}",
        stem,
        file_safe_label(label),
        format.extension()
    )
}

/// Label as it appears in heatmap file names, path separators replaced by `_`.
pub fn file_safe_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn image_format(format: HeatmapFormat) -> ImageFormat {
    match format {
        HeatmapFormat::Jpeg => ImageFormat::Jpeg,
        HeatmapFormat::Png => ImageFormat::Png,
        HeatmapFormat::Bmp => ImageFormat::Bmp,
    }
}

/// Encode and write a heatmap, replacing any file of the same name.
pub fn write_heatmap(
    image: &RgbImage,
    output_dir: &Path,
    file_name: &str,
    format: HeatmapFormat,
    url_prefix: &str,
) -> Result<HeatmapRef> {
    let path = output_dir.join(file_name);
    image
        .save_with_format(&path, image_format(format))
        .map_err(|e| ExplainError::Persist {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let url = format!("{}/{}", url_prefix.trim_end_matches('/'), file_name);
    Ok(HeatmapRef { path, url })
}

fn regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Remove every regular file directly inside `dir`.
///
/// A missing directory counts as already clean. Files that cannot be
/// removed are logged and skipped.
///
/// # Returns
///
/// Number of files removed.
pub fn clear_directory(dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for path in regular_files(dir)? {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(file = %path.display(), "Removed");
                removed += 1;
            }
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "Could not remove file"),
        }
    }
    Ok(removed)
}

/// Remove regular files in `dir` last modified more than `max_age` ago.
///
/// # Returns
///
/// Number of files removed.
pub fn remove_older_than(dir: impl AsRef<Path>, max_age: Duration) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for path in regular_files(dir)? {
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "No modification time, skipped");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(file = %path.display(), "Removed stale file");
                removed += 1;
            }
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "Could not remove file"),
        }
    }
    Ok(removed)
}
