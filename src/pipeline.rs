// ABOUTME: End-to-end processing of a slide document
// ABOUTME: Front matter, macro table, preprocessing, smart quotes and markup sanitizing in order

use crate::config::AppConfig;
use crate::errors::Result;
use crate::frontmatter::{extract, Metadata};
use crate::macros::MacroTable;
use crate::media::{probe_large_variants, MediaAvailability};
use crate::preprocess::{preprocess, PreprocessOptions};
use crate::sanitize::sanitize_embedded_markup;
use crate::smart_quotes::convert_smart_quotes;
use crate::utils::validate_file_exists;
use log::{info, warn};
use std::fs;
use std::path::Path;
use url::Url;

/// Caller choices that are not part of the document
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub handout: bool,
    pub suppress_visuals: bool,
    pub prefer_high_bitrate: Option<bool>,
    pub availability: Option<MediaAvailability>,
    /// Probe unknown large variants under this base URL before preprocessing
    pub probe_base: Option<Url>,
}

/// A document ready for the Reveal.js markdown plugin
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub metadata: Metadata,
    pub markdown: String,
}

pub fn process_document(raw: &str, options: &PipelineOptions, app: &AppConfig) -> ProcessedDocument {
    let mut front = extract(raw);
    let metadata = &mut front.metadata;

    if let Some(base) = options.probe_base.as_ref() {
        match probe_large_variants(&mut metadata.media, base, app.fetch_timeout_ms) {
            Ok(answered) => info!("Probed {} large media variants", answered),
            Err(e) => warn!("Large variant probe failed: {}", e),
        }
    }

    let macros = MacroTable::with_overrides(&metadata.macros);
    let preprocess_options = PreprocessOptions {
        handout: options.handout,
        new_slide_on_heading: metadata.new_slide_on_heading(),
        prefer_high_bitrate: options.prefer_high_bitrate,
        suppress_visuals: options.suppress_visuals,
        note_separator: metadata.note_separator(),
        availability: options.availability.clone(),
    };

    let mut markdown = preprocess(
        &front.content,
        &macros,
        &metadata.media,
        &preprocess_options,
        app,
    );
    if metadata.convert_smart_quotes() {
        markdown = convert_smart_quotes(&markdown);
    }

    ProcessedDocument {
        markdown: sanitize_embedded_markup(&markdown),
        metadata: front.metadata,
    }
}

/// Read and process a markdown file
pub fn process_file(path: &Path, options: &PipelineOptions, app: &AppConfig) -> Result<ProcessedDocument> {
    info!("Processing markdown: {:?}", path);
    validate_file_exists(path)?;
    let raw = fs::read_to_string(path)?;
    Ok(process_document(&raw, options, app))
}
