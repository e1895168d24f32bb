// ABOUTME: Rendering engine configuration for a presentation
// ABOUTME: Starts from the front matter `config` block and applies query-string overrides

use crate::frontmatter::Metadata;
use log::warn;
use serde_json::{Map, Value};

/// Engine options this tool is allowed to force
pub const RECOGNIZED_KEYS: &[&str] = &[
    "controls",
    "progress",
    "slideNumber",
    "showSlideNumber",
    "showNotes",
    "autoSlide",
    "autoSlideStoppable",
];

/// The document's own engine settings as a JSON object
pub fn base_config(metadata: &Metadata) -> Map<String, Value> {
    let Some(config) = metadata.config.as_ref() else {
        return Map::new();
    };
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            warn!("Ignoring front matter config that is not a mapping: {}", other);
            Map::new()
        }
        Err(e) => {
            warn!("Ignoring front matter config that cannot be converted: {}", e);
            Map::new()
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes")
}

fn set(config: &mut Map<String, Value>, key: &str, value: Value) {
    debug_assert!(RECOGNIZED_KEYS.contains(&key));
    config.insert(key.to_string(), value);
}

/// Force engine options from query parameters such as `?forceControls=1`
pub fn apply_query_overrides(config: &mut Map<String, Value>, query: &str) {
    let query = query.trim_start_matches('?');
    let mut force_controls = false;
    let mut hide_controls = false;
    let mut show_notes = false;
    let mut auto_slide: Option<String> = None;
    let mut stoppable: Option<String> = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "forceControls" => force_controls = flag(&value),
            "hideControls" => hide_controls = flag(&value),
            "showNotes" => show_notes = flag(&value),
            "autoSlide" => auto_slide = Some(value.into_owned()),
            "autoSlideStoppable" => stoppable = Some(value.into_owned()),
            _ => {}
        }
    }

    if force_controls {
        set(config, "controls", Value::Bool(true));
        set(config, "progress", Value::Bool(true));
        set(config, "slideNumber", Value::from("c/t"));
        set(config, "showSlideNumber", Value::from("all"));
    }
    if hide_controls {
        set(config, "controls", Value::Bool(false));
        set(config, "progress", Value::Bool(false));
    }
    if show_notes {
        set(config, "showNotes", Value::Bool(true));
    }
    if let Some(raw) = auto_slide {
        match raw.trim().parse::<u64>() {
            Ok(ms) => {
                set(config, "autoSlide", Value::from(ms));
                let stoppable = stoppable.as_deref().map_or(true, flag);
                set(config, "autoSlideStoppable", Value::Bool(stoppable));
            }
            Err(_) => warn!("Ignoring invalid autoSlide value: {}", raw),
        }
    }
}

/// Document config with query overrides applied
pub fn engine_config(metadata: &Metadata, query: &str) -> Map<String, Value> {
    let mut config = base_config(metadata);
    apply_query_overrides(&mut config, query);
    config
}

/// Slide numbers shown as a running count (`c` or `c/t`) instead of `h.v`
pub fn counts_slides(config: &Map<String, Value>) -> bool {
    matches!(
        config.get("slideNumber").and_then(Value::as_str),
        Some("c") | Some("c/t")
    )
}
