// ABOUTME: Handout HTML generation for a slide document
// ABOUTME: Renders each retained slide and its notes with comrak and sanitizes the result

use crate::config::AppConfig;
use crate::engine::{base_config, counts_slides};
use crate::errors::{Result, RevelationError};
use crate::pipeline::{process_file, PipelineOptions, ProcessedDocument};
use crate::resources::ResourceFile;
use crate::sanitize::sanitize_fragment;
use crate::segment::{clean_markdown, is_blank_slide, segment, split_notes, SlideIndexer};
use crate::utils::{ensure_parent_directory_exists, escape_html};
use comrak::{markdown_to_html, ComrakOptions};
use log::{info, warn};
use std::fs;
use std::path::Path;

const DEFAULT_TITLE: &str = "Presentation Handout";

/// How the handout page is assembled
#[derive(Debug, Clone, Default)]
pub struct HandoutConfig {
    /// File name the slide-number links point back to (`index.html?p=<file>`)
    pub document_name: String,
    pub css_files: Vec<ResourceFile>,
    pub embed_resources: bool,
}

fn render_markdown(markdown: &str) -> String {
    let mut options = ComrakOptions::default();
    options.render.unsafe_ = true;
    options.extension.table = true;
    options.extension.strikethrough = true;
    sanitize_fragment(&markdown_to_html(markdown, &options))
}

/// Slide sections of the handout body, one per retained slide
pub fn render_slides(doc: &ProcessedDocument, document_name: &str) -> Vec<String> {
    let counting = counts_slides(&base_config(&doc.metadata));
    let separator = doc.metadata.note_separator();
    let link_target = escape_html(document_name);

    let mut indexer = SlideIndexer::new();
    let mut slide_count = 0;
    let mut sections = Vec::new();

    for slide in segment(&doc.markdown) {
        let index = indexer.advance(slide.break_type);
        slide_count += 1;

        let parts = split_notes(slide.content.trim(), separator);
        let content = clean_markdown(&parts.content);
        let notes = clean_markdown(&parts.notes);
        if is_blank_slide(&content) && notes.is_empty() {
            continue;
        }

        let number = if counting {
            slide_count.to_string()
        } else {
            index.label()
        };

        let mut section = vec![
            r#"<section class="slide">"#.to_string(),
            format!(
                r#"<div class="slide-number slide-number-link" style="display: none"><a href="index.html?p={}#{}/{}" target="_blank" rel="noopener noreferrer">{}</a></div>"#,
                link_target, index.h, index.v, number
            ),
            format!(r#"<div class="slide-number slide-number-nolink">{}</div>"#, number),
            render_markdown(&content),
        ];
        if !notes.is_empty() {
            section.push(format!(r#"<div class="note">{}</div>"#, render_markdown(&notes)));
        }
        section.push("</section>".to_string());
        sections.push(section.join("\n"));
    }

    info!("Rendered {} handout slides", sections.len());
    sections
}

/// Complete handout page for an already processed document
pub fn render_handout(doc: &ProcessedDocument, config: &HandoutConfig, app: &AppConfig) -> String {
    let metadata = &doc.metadata;
    let title = metadata.title_or(DEFAULT_TITLE);

    let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));

    if let Some(theme) = metadata.theme.as_deref().filter(|t| !t.is_empty()) {
        html.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(&format!("{}{}", app.style_path, theme))
        ));
    }
    if let Some(stylesheet) = metadata.stylesheet.as_deref().filter(|s| !s.is_empty()) {
        html.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(stylesheet)
        ));
    }
    for css in &config.css_files {
        match css.stylesheet_tag(config.embed_resources) {
            Ok(tag) => {
                html.push_str(&tag);
                html.push('\n');
            }
            Err(e) => warn!("Failed to include CSS resource {}: {}", css.path, e),
        }
    }

    html.push_str("</head>\n<body>\n<div id=\"handout-content\">\n");
    for section in render_slides(doc, &config.document_name) {
        html.push_str(&section);
        html.push('\n');
    }
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Read a markdown file and build its handout page
pub fn generate_handout(markdown_path: &Path, config: &HandoutConfig, app: &AppConfig) -> Result<String> {
    info!("Generating handout from markdown: {:?}", markdown_path);
    let options = PipelineOptions {
        handout: true,
        ..PipelineOptions::default()
    };
    let doc = process_file(markdown_path, &options, app)?;

    let mut config = config.clone();
    if config.document_name.is_empty() {
        config.document_name = markdown_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RevelationError::ValidationError(format!("Invalid markdown path: {:?}", markdown_path))
            })?;
    }
    Ok(render_handout(&doc, &config, app))
}

pub fn write_html_to_file(html: &str, output_path: &Path) -> Result<()> {
    info!("Writing HTML to file: {:?}", output_path);
    ensure_parent_directory_exists(output_path)?;
    fs::write(output_path, html)?;
    Ok(())
}
