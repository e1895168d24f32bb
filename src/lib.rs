// ABOUTME: Library module for the revelation slide preprocessor.
// ABOUTME: Turns extended markdown slide documents into Reveal.js markdown and handout HTML.

pub mod config;
pub mod engine;
pub mod errors;
pub mod frontmatter;
pub mod handout;
pub mod macros;
pub mod magic;
pub mod media;
pub mod pipeline;
pub mod preprocess;
pub mod resources;
pub mod sanitize;
pub mod segment;
pub mod smart_quotes;
pub mod utils;

// Reexport common types and functions
pub use config::AppConfig;
pub use engine::engine_config;
pub use errors::{Result, RevelationError};
pub use frontmatter::{extract, FrontMatter, Metadata, NoteSeparator};
pub use handout::{generate_handout, render_handout, write_html_to_file, HandoutConfig};
pub use macros::MacroTable;
pub use media::{MediaAvailability, MediaCatalog, MediaItem};
pub use pipeline::{process_document, process_file, PipelineOptions, ProcessedDocument};
pub use preprocess::{preprocess, PreprocessOptions};
pub use resources::ResourceFile;
pub use sanitize::{sanitize_embedded_markup, sanitize_fragment};
pub use segment::{segment, BreakType, Segment};
pub use smart_quotes::convert_smart_quotes;
