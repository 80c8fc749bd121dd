//! Metadata sidecar files.
//!
//! Each staged video carries a plain-text sidecar next to it (same stem,
//! `.txt`): up to four newline-separated lines in fixed order: title,
//! comma-joined topics, product link, product short title. The workflow
//! runner reads the sidecar back when no explicit flags are given.

use std::path::{Path, PathBuf};

use crate::error::StagingError;

/// Metadata loaded from (or destined for) a sidecar file. All fields are
/// optional; an empty line means "absent".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarMeta {
    pub title: Option<String>,
    pub topics: Vec<String>,
    pub product_link: Option<String>,
    pub product_short_title: Option<String>,
}

/// Splits a free-form topic string into clean tags.
///
/// Fullwidth commas and enumeration commas are treated as separators, as
/// are `#` markers and whitespace runs. Empty segments drop; duplicates
/// drop keeping first-occurrence order.
pub fn normalize_topics(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(|c: char| c == ',' || c == '，' || c == '、' || c == '#' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Path of the sidecar belonging to a video file.
pub fn sidecar_path(video: &Path) -> PathBuf {
    video.with_extension("txt")
}

/// Writes the four-line sidecar next to the staged video and returns its
/// path.
pub fn write_sidecar(video: &Path, meta: &SidecarMeta) -> Result<PathBuf, StagingError> {
    let path = sidecar_path(video);
    let lines = [
        meta.title.as_deref().unwrap_or("").trim().to_string(),
        meta.topics.join(","),
        meta.product_link.as_deref().unwrap_or("").trim().to_string(),
        meta.product_short_title.as_deref().unwrap_or("").trim().to_string(),
    ];

    std::fs::write(&path, lines.join("\n")).map_err(|e| StagingError::WriteFile {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}

/// Loads a sidecar. A missing file is not an error; it simply yields empty
/// metadata, matching how optional the sidecar is to the runner.
pub fn load_sidecar(path: &Path) -> Result<SidecarMeta, StagingError> {
    if !path.exists() {
        return Ok(SidecarMeta::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| StagingError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut lines = content.lines().map(str::trim);
    let title = lines.next().filter(|l| !l.is_empty()).map(str::to_string);
    let topics = lines.next().map(normalize_topics).unwrap_or_default();
    let product_link = lines.next().filter(|l| !l.is_empty()).map(str::to_string);
    let product_short_title = lines.next().filter(|l| !l.is_empty()).map(str::to_string);

    Ok(SidecarMeta {
        title,
        topics,
        product_link,
        product_short_title,
    })
}
