// ABOUTME: Error types for the revelation slide preprocessor
// ABOUTME: Document content never fails; these cover I/O and resource loading at the edges

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevelationError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to fetch remote resource: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Invalid resource path: {0}")]
    InvalidResourcePath(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTML generation error: {0}")]
    HtmlError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl From<anyhow::Error> for RevelationError {
    fn from(err: anyhow::Error) -> Self {
        RevelationError::UnknownError(err.to_string())
    }
}

impl From<url::ParseError> for RevelationError {
    fn from(err: url::ParseError) -> Self {
        RevelationError::InvalidResourcePath(format!("Invalid URL: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RevelationError>;
