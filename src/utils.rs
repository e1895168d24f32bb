// ABOUTME: Utility functions for the revelation slide preprocessor
// ABOUTME: Provides validation, path handling and small text helpers

use crate::errors::{Result, RevelationError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static MARKDOWN_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+\.md$").unwrap());

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(RevelationError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(RevelationError::ValidationError(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(RevelationError::FileReadError)?;
    } else if !path.is_dir() {
        return Err(RevelationError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory_exists(parent)?;
        }
    }
    Ok(())
}

/// Accept only bare markdown file names such as `talk-en.md`.
///
/// Alternative versions are addressed by name from inside a document, so
/// anything with a path separator or another extension is refused.
pub fn validate_markdown_filename(name: &str) -> Result<&str> {
    if MARKDOWN_FILENAME.is_match(name) {
        Ok(name)
    } else {
        Err(RevelationError::ValidationError(format!(
            "Blocked invalid markdown filename: {}",
            name
        )))
    }
}

/// Escape text for use inside HTML element content or a quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
