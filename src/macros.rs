// ABOUTME: Macro table for slide documents
// ABOUTME: Merges built-in templates with front matter overrides and expands `$n` placeholders

use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").unwrap());

/// Built-in templates; user macros with the same name replace them
const BUILTIN_MACROS: &[(&str, &str)] = &[
    ("darkbg", "<!-- .slide: data-darkbg -->"),
    ("lightbg", "<!-- .slide: data-lightbg -->"),
    ("lowerthird", "<!-- .slide: data-lower-third -->"),
    ("upperthird", "<!-- .slide: data-upper-third -->"),
    ("columnstart", r#"<div class="flexcontainer"><div class="first">"#),
    ("columnbreak", r#"</div><div class="second">"#),
    ("columnend", "</div></div>"),
    ("attrib", ":ATTRIB:$1"),
    ("ai", ":AI:"),
    ("transition", r#"<!-- .slide: data-transition="$1" -->"#),
    ("audiostart", r#"<!-- .slide: data-background-audio-start="$1" -->"#),
    ("audioloop", r#"<!-- .slide: data-background-audio-loop="$1" -->"#),
    ("audiostop", "<!-- .slide: data-background-audio-stop -->"),
];

/// Macros that never become sticky
const STRUCTURAL_MACROS: &[&str] = &[
    "attrib",
    "ai",
    "columnstart",
    "columnbreak",
    "columnend",
    "countdown",
];

const COUNTDOWN: &str = "countdown";

/// Column template names in the order `||` cycles through them
pub const COLUMN_CYCLE: [&str; 3] = ["columnstart", "columnbreak", "columnend"];

/// Macro name to template, built-ins merged with user overrides
#[derive(Debug, Clone, PartialEq)]
pub struct MacroTable {
    templates: BTreeMap<String, String>,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MacroTable {
    pub fn builtin() -> Self {
        let templates = BUILTIN_MACROS
            .iter()
            .map(|(name, template)| (name.to_string(), template.to_string()))
            .collect();
        Self { templates }
    }

    /// Built-ins overlaid with front matter `macros`
    pub fn with_overrides(user: &BTreeMap<String, String>) -> Self {
        let mut table = Self::builtin();
        for (name, template) in user {
            table.templates.insert(name.clone(), template.clone());
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name) || name == COUNTDOWN
    }

    pub fn is_structural(name: &str) -> bool {
        STRUCTURAL_MACROS.contains(&name)
    }

    /// Expand `name` with positional `params` into output lines.
    ///
    /// Returns `None` for unknown macros. Missing parameters expand to the
    /// empty string.
    pub fn expand(&self, name: &str, params: &[&str]) -> Option<Vec<String>> {
        if let Some(template) = self.get(name) {
            let expanded = substitute(template, params);
            return Some(expanded.split('\n').map(str::to_string).collect());
        }
        (name == COUNTDOWN).then(|| countdown(params).into_iter().collect())
    }
}

fn substitute(template: &str, params: &[&str]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| params.get(i))
                .map(|p| p.to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// `countdown:from:MM:SS` or `countdown:to:HH:MM`.
///
/// Invalid parameters are logged and yield `None`.
fn countdown(params: &[&str]) -> Option<String> {
    let mode = params.first().map(|m| m.trim().to_ascii_lowercase());
    let first = params.get(1).and_then(|v| v.trim().parse::<u32>().ok());
    let second = params
        .get(2)
        .map(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(Some(0));

    let from_total = match (first, second) {
        (Some(minutes), Some(seconds)) if seconds < 60 => minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(seconds)),
        _ => None,
    };

    match (mode.as_deref(), from_total, first, second) {
        (Some("from"), Some(total), _, _) => {
            Some(format!(
                r#"<div class="countdown" data-countdown-mode="from" data-countdown-seconds="{}">{}</div>"#,
                total,
                format_clock(total)
            ))
        }
        (Some("to"), _, Some(hour), Some(minute)) if hour < 24 && minute < 60 => Some(format!(
            r#"<div class="countdown" data-countdown-mode="to" data-countdown-hour="{}" data-countdown-minute="{}"></div>"#,
            hour, minute
        )),
        _ => {
            warn!("Invalid countdown parameters: {:?}", params);
            None
        }
    }
}

fn format_clock(total: u32) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
