// ABOUTME: Front matter extraction for slide documents
// ABOUTME: Splits a leading `---` YAML block from the markdown body without ever failing

use crate::media::MediaCatalog;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

static FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A---\r?\n((?s:.*?))\r?\n---(?:\r?\n|\z)").unwrap());

/// Title shown when the front matter could not be parsed
pub const MALFORMED_TITLE: &str = "{malformed YAML}";

/// First document version that uses `:note:` as the speaker-notes separator
pub const CURRENT_NOTES_VERSION: (u64, u64, u64) = (0, 2, 6);

/// Document metadata read from the front matter block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub theme: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub stylesheet: Option<String>,
    pub macros: BTreeMap<String, String>,
    pub media: MediaCatalog,
    /// Passed through to the rendering engine
    pub config: Option<serde_yaml::Value>,
    /// Alternate document file name to language label
    pub alternatives: BTreeMap<String, String>,
    #[serde(rename = "newSlideOnHeading")]
    pub new_slide_on_heading: Option<bool>,
    #[serde(rename = "convertSmartQuotes")]
    pub convert_smart_quotes: Option<bool>,
    pub scrollspeed: Option<serde_yaml::Value>,
    #[serde(deserialize_with = "scalar_string")]
    pub version: Option<String>,
    /// Set when the front matter failed to parse
    #[serde(skip)]
    pub malformed: bool,
}

impl Metadata {
    /// Sentinel metadata substituted for unparseable front matter
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            title: Some(MALFORMED_TITLE.to_string()),
            description: Some(message.into()),
            malformed: true,
            ..Self::default()
        }
    }

    pub fn new_slide_on_heading(&self) -> bool {
        self.new_slide_on_heading.unwrap_or(true)
    }

    pub fn convert_smart_quotes(&self) -> bool {
        self.convert_smart_quotes.unwrap_or(true)
    }

    pub fn note_separator(&self) -> NoteSeparator {
        NoteSeparator::for_version(self.version.as_deref())
    }

    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(fallback)
    }
}

/// A document split into its metadata and markdown body
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub metadata: Metadata,
    pub content: String,
}

/// Split `raw` into metadata and content.
///
/// Without a leading `---` block the content is returned untouched and the
/// metadata is empty. A block that fails to parse yields
/// [`Metadata::malformed`] and the content after the block.
pub fn extract(raw: &str) -> FrontMatter {
    let Some(captures) = FRONT_MATTER.captures(raw) else {
        return FrontMatter {
            metadata: Metadata::default(),
            content: raw.to_string(),
        };
    };

    let block_end = captures.get(0).map_or(0, |m| m.end());
    let yaml = captures.get(1).map_or("", |m| m.as_str());

    FrontMatter {
        metadata: parse_metadata(yaml),
        content: raw[block_end..].to_string(),
    }
}

fn parse_metadata(yaml: &str) -> Metadata {
    if yaml.trim().is_empty() {
        return Metadata::default();
    }

    let parsed = serde_yaml::from_str::<serde_yaml::Value>(yaml).and_then(|value| {
        if value.is_null() {
            Ok(Metadata::default())
        } else {
            serde_yaml::from_value::<Metadata>(value)
        }
    });

    match parsed {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Malformed front matter: {}", e);
            Metadata::malformed(e.to_string())
        }
    }
}

/// Speaker-notes separator syntax, selected by the document `version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteSeparator {
    /// `Note:` at the start of a line
    #[default]
    Legacy,
    /// `:note:` alone on a line
    Current,
}

impl NoteSeparator {
    /// Documents without a readable version predate `:note:`
    pub fn for_version(version: Option<&str>) -> Self {
        match version.and_then(parse_version) {
            Some(v) if v >= CURRENT_NOTES_VERSION => NoteSeparator::Current,
            _ => NoteSeparator::Legacy,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            NoteSeparator::Legacy => "Note:",
            NoteSeparator::Current => ":note:",
        }
    }

    /// Whether a markdown line starts the notes section
    pub fn matches(self, line: &str) -> bool {
        match self {
            NoteSeparator::Legacy => line
                .get(..5)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("note:")),
            NoteSeparator::Current => line.trim() == ":note:",
        }
    }
}

fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    let mut parts = version.split('.').map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().ok()
    });

    let major = parts.next().flatten()?;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}

/// Accept any YAML scalar where a string is expected (`version: 0.3`)
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Sequence(items)) => {
            let joined: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect();
            Ok(Some(joined.join(", ")))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar value, found {:?}",
            other
        ))),
    }
}
