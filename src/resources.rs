// ABOUTME: Local and remote resources used around a presentation
// ABOUTME: Loads stylesheets and media availability indices from disk or over HTTP

use crate::errors::{Result, RevelationError};
use crate::utils::escape_html;
use log::{info, warn};
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;

const FETCH_ATTEMPTS: u32 = 3;

/// A file addressed either by filesystem path or by `http(s)` URL
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFile {
    pub path: String,
    pub is_remote: bool,
    pub timeout_ms: u64,
}

impl ResourceFile {
    pub fn new(path: &str) -> Self {
        let is_remote = path.starts_with("http://") || path.starts_with("https://");
        Self {
            path: path.to_string(),
            is_remote,
            timeout_ms: 10000,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn content(&self) -> Result<String> {
        if self.is_remote {
            self.fetch_remote_content()
        } else {
            self.read_local_content()
        }
    }

    /// GET with up to three attempts and doubling backoff
    fn fetch_remote_content(&self) -> Result<String> {
        info!("Fetching remote resource: {}", self.path);

        let client = Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()?;

        let mut backoff_ms = 250;
        let mut last_error = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            match client.get(&self.path).send() {
                Ok(response) if response.status().is_success() => return Ok(response.text()?),
                Ok(response) => {
                    last_error = Some(RevelationError::ValidationError(format!(
                        "HTTP error {} for {}",
                        response.status(),
                        self.path
                    )));
                }
                Err(e) => last_error = Some(RevelationError::FetchError(e)),
            }

            if attempt < FETCH_ATTEMPTS {
                warn!(
                    "Fetch attempt {} for {} failed, retrying in {} ms",
                    attempt, self.path, backoff_ms
                );
                std::thread::sleep(Duration::from_millis(backoff_ms));
                backoff_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RevelationError::UnknownError(format!("Could not fetch {}", self.path))
        }))
    }

    fn read_local_content(&self) -> Result<String> {
        info!("Reading local resource: {}", self.path);
        let path = Path::new(&self.path);
        if !path.exists() {
            return Err(RevelationError::PathNotFoundError(path.to_path_buf()));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// `<style>` with the file inlined, or a `<link>` for remote files and
    /// when `embed` is off
    pub fn stylesheet_tag(&self, embed: bool) -> Result<String> {
        if self.is_remote || !embed {
            return Ok(format!(
                r#"<link rel="stylesheet" href="{}">"#,
                escape_html(&self.path)
            ));
        }
        let content = self.content()?;
        if content.to_ascii_lowercase().contains("</style") {
            return Err(RevelationError::InvalidResourcePath(format!(
                "Stylesheet cannot be embedded: {}",
                self.path
            )));
        }
        Ok(format!("<style>\n{}\n</style>", content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn remote_detection_uses_scheme() {
        assert!(ResourceFile::new("https://example.com/handout.css").is_remote);
        assert!(!ResourceFile::new("css/handout.css").is_remote);
    }

    #[test]
    fn local_stylesheet_is_embedded_or_linked() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b".slide { page-break-after: always; }").expect("write");
        let resource = ResourceFile::new(file.path().to_str().unwrap());

        let embedded = resource.stylesheet_tag(true).expect("embed");
        assert!(embedded.starts_with("<style>"));
        assert!(embedded.contains("page-break-after"));

        let linked = resource.stylesheet_tag(false).expect("link");
        assert!(linked.starts_with(r#"<link rel="stylesheet" href=""#));
    }

    #[test]
    fn missing_local_file_is_reported() {
        let resource = ResourceFile::new("/nonexistent/revelation/handout.css");
        assert!(matches!(
            resource.content(),
            Err(RevelationError::PathNotFoundError(_))
        ));
    }

    #[test]
    fn style_close_tag_blocks_embedding() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"body{}</style><script>alert(1)</script>").expect("write");
        let resource = ResourceFile::new(file.path().to_str().unwrap());
        assert!(resource.stylesheet_tag(true).is_err());
    }
}
