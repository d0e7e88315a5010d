//! Transcript filename helpers.

use crate::error::{ClientError, Result};
use regex::Regex;
use scribe_core::TaskStatusPayload;
use std::sync::OnceLock;

const MAX_TITLE_CHARS: usize = 80;
const UNTITLED: &str = "untitled";

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-\s]").expect("valid pattern"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid pattern"))
}

/// Turn a media title into a filename stem, the same way the backend does.
pub fn sanitize_title(title: &str) -> String {
    if title.is_empty() {
        return UNTITLED.to_string();
    }

    let kept = unsafe_chars().replace_all(title, "");
    let joined = whitespace().replace_all(&kept, "_");
    let trimmed = joined.trim_matches(|c| c == '.' || c == '_' || c == '-');

    let safe: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    if safe.is_empty() {
        UNTITLED.to_string()
    } else {
        safe
    }
}

/// Check a filename before asking the backend for it.
///
/// Only `.txt` and `.md` files may be downloaded and the name must not
/// contain path separators or parent references.
pub fn validate_filename(filename: &str) -> Result<()> {
    if !(filename.ends_with(".txt") || filename.ends_with(".md")) {
        return Err(ClientError::InvalidFilename(format!(
            "{filename}: only .txt or .md files can be downloaded"
        )));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(ClientError::InvalidFilename(format!(
            "{filename}: path components are not allowed"
        )));
    }

    Ok(())
}

/// Pick the download filename for a finished task.
///
/// Prefers the basename of `script_path`, then `safe_title`, then the
/// sanitized video title.
pub fn transcript_filename(status: &TaskStatusPayload) -> Option<String> {
    if let Some(path) = status.script_path.as_deref() {
        let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        if !basename.is_empty() {
            return Some(basename.to_string());
        }
    }

    if let Some(safe_title) = status.safe_title.as_deref().filter(|t| !t.is_empty()) {
        return Some(format!("{safe_title}.txt"));
    }

    status
        .video_title
        .as_deref()
        .map(|title| format!("{}.txt", sanitize_title(title)))
}
