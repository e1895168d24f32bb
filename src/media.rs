// ABOUTME: Media catalog handling for slide documents
// ABOUTME: Resolves `media:` aliases to paths, gates large variants and probes their availability

use crate::errors::Result;
use crate::frontmatter::scalar_string;
use crate::resources::ResourceFile;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use url::Url;

static MEDIA_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\(media:([a-zA-Z0-9_-]+)\)|"media:([a-zA-Z0-9_-]+)""#).unwrap()
});

/// Alias to media item, as declared under `media:` in the front matter
pub type MediaCatalog = BTreeMap<String, MediaItem>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaItem {
    #[serde(deserialize_with = "scalar_string")]
    pub filename: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub original_filename: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub attribution: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub license: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub mediatype: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub keywords: Option<String>,
    pub large_variant: Option<LargeVariant>,
    /// `None` until an availability probe has answered
    pub large_variant_local: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LargeVariant {
    #[serde(deserialize_with = "scalar_string")]
    pub filename: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub original_filename: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub url_direct: Option<String>,
}

impl MediaItem {
    /// Attribution line credited on the slide, e.g. `© Jane Doe (CC-BY)`
    pub fn attribution_line(&self) -> Option<String> {
        let attribution = self.attribution.as_deref().filter(|a| !a.trim().is_empty())?;
        Some(match self.license.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(license) => format!("© {} ({})", attribution, license),
            None => format!("© {}", attribution),
        })
    }

    fn large_filename(&self) -> Option<&str> {
        self.large_variant
            .as_ref()
            .and_then(|v| v.filename.as_deref())
            .filter(|f| !f.is_empty())
    }

    /// Only a confirmed `true` counts; unknown is treated as absent.
    /// An index entry takes precedence over the item's own flag.
    pub fn large_variant_is_local(&self, availability: Option<&MediaAvailability>) -> bool {
        let from_index = self
            .filename
            .as_deref()
            .and_then(|f| availability.and_then(|a| a.large_variant_local(f)));
        from_index.or(self.large_variant_local) == Some(true)
    }

    /// Filename to reference for this item, or `None` if it has none
    pub fn select_filename(
        &self,
        prefer_high_bitrate: bool,
        availability: Option<&MediaAvailability>,
    ) -> Option<&str> {
        let standard = self.filename.as_deref().filter(|f| !f.is_empty())?;
        if prefer_high_bitrate && self.large_variant_is_local(availability) {
            if let Some(large) = self.large_filename() {
                return Some(large);
            }
        }
        Some(standard)
    }
}

/// Which large variants are present locally, keyed by standard filename
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct MediaAvailability(HashMap<String, bool>);

impl MediaAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, local: bool) {
        self.0.insert(filename.into(), local);
    }

    pub fn large_variant_local(&self, filename: &str) -> Option<bool> {
        self.0.get(filename).copied()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load an index from a local file or URL
    pub fn load(source: &ResourceFile) -> Result<Self> {
        info!("Loading media availability index: {}", source.path);
        Self::from_json(&source.content()?)
    }
}

/// Outcome of resolving the media aliases on one line
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub line: String,
    pub attributions: Vec<String>,
}

/// Resolves `media:<alias>` references against a catalog
pub struct MediaResolver<'a> {
    pub catalog: &'a MediaCatalog,
    pub availability: Option<&'a MediaAvailability>,
    pub base_path: &'a str,
    pub prefer_high_bitrate: bool,
}

impl<'a> MediaResolver<'a> {
    pub fn contains_alias(line: &str) -> bool {
        MEDIA_ALIAS.is_match(line)
    }

    /// Replace every resolvable alias inside `(...)` or `"..."`.
    ///
    /// Unknown aliases and entries without a filename are left as written.
    pub fn resolve_line(&self, line: &str) -> ResolvedLine {
        let mut attributions = Vec::new();
        let resolved = MEDIA_ALIAS.replace_all(line, |caps: &Captures| {
            let (alias, open, close) = match (caps.get(1), caps.get(2)) {
                (Some(alias), _) => (alias.as_str(), "(", ")"),
                (None, Some(alias)) => (alias.as_str(), "\"", "\""),
                (None, None) => return caps[0].to_string(),
            };

            let Some(item) = self.catalog.get(alias) else {
                debug!("Media alias not found in catalog: {}", alias);
                return caps[0].to_string();
            };
            let Some(filename) = item.select_filename(self.prefer_high_bitrate, self.availability)
            else {
                debug!("Media alias has no filename: {}", alias);
                return caps[0].to_string();
            };

            if let Some(attribution) = item.attribution_line() {
                attributions.push(attribution);
            }
            format!("{}{}{}{}", open, self.base_path, filename, close)
        });

        ResolvedLine {
            line: resolved.into_owned(),
            attributions,
        }
    }
}

/// Probe large variants whose availability is still unknown.
///
/// Issues a HEAD request for `<base>/<large filename>` per item and records
/// whether it succeeded. Network failures leave the flag unknown. Returns the
/// number of items that received an answer.
pub fn probe_large_variants(catalog: &mut MediaCatalog, base: &Url, timeout_ms: u64) -> Result<usize> {
    let client = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?;

    let mut answered = 0;
    for (alias, item) in catalog.iter_mut() {
        if item.large_variant_local.is_some() {
            continue;
        }
        let Some(large) = item.large_filename() else {
            continue;
        };
        let target = base.join(large)?;

        match client.head(target.as_str()).send() {
            Ok(response) => {
                let local = response.status().is_success();
                info!("Large variant for {} is {}", alias, if local { "local" } else { "missing" });
                item.large_variant_local = Some(local);
                answered += 1;
            }
            Err(e) => {
                warn!("Failed to probe large variant for {}: {}", alias, e);
            }
        }
    }
    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sunset() -> MediaItem {
        MediaItem {
            filename: Some("sunset.jpg".to_string()),
            attribution: Some("Jane Doe".to_string()),
            license: Some("CC-BY".to_string()),
            large_variant: Some(LargeVariant {
                filename: Some("sunset-4k.jpg".to_string()),
                ..LargeVariant::default()
            }),
            ..MediaItem::default()
        }
    }

    fn catalog() -> MediaCatalog {
        let mut catalog = MediaCatalog::new();
        catalog.insert("sunset".to_string(), sunset());
        catalog.insert("bare".to_string(), MediaItem::default());
        catalog
    }

    #[test]
    fn resolves_parenthesized_and_quoted_aliases() {
        let catalog = catalog();
        let resolver = MediaResolver {
            catalog: &catalog,
            availability: None,
            base_path: "../_media/",
            prefer_high_bitrate: false,
        };

        let resolved = resolver.resolve_line(r#"![](media:sunset) <img src="media:sunset">"#);
        assert_eq!(
            resolved.line,
            r#"![](../_media/sunset.jpg) <img src="../_media/sunset.jpg">"#
        );
        assert_eq!(resolved.attributions.len(), 2);
        assert_eq!(resolved.attributions[0], "© Jane Doe (CC-BY)");
    }

    #[test]
    fn unknown_or_filenameless_aliases_stay_unresolved() {
        let catalog = catalog();
        let resolver = MediaResolver {
            catalog: &catalog,
            availability: None,
            base_path: "../_media/",
            prefer_high_bitrate: false,
        };

        let resolved = resolver.resolve_line("![](media:missing) ![](media:bare)");
        assert_eq!(resolved.line, "![](media:missing) ![](media:bare)");
        assert!(resolved.attributions.is_empty());
    }

    #[test]
    fn large_variant_requires_confirmed_availability() {
        let mut item = sunset();
        assert_eq!(item.select_filename(true, None), Some("sunset.jpg"));

        item.large_variant_local = Some(false);
        assert_eq!(item.select_filename(true, None), Some("sunset.jpg"));

        item.large_variant_local = Some(true);
        assert_eq!(item.select_filename(true, None), Some("sunset-4k.jpg"));
        assert_eq!(item.select_filename(false, None), Some("sunset.jpg"));

        let mut index = MediaAvailability::new();
        index.insert("sunset.jpg", false);
        assert_eq!(item.select_filename(true, Some(&index)), Some("sunset.jpg"));
    }

    #[test]
    fn availability_index_parses_from_json() {
        let index = MediaAvailability::from_json(r#"{"sunset.jpg": true, "river.mp4": false}"#)
            .expect("valid index");
        assert_eq!(index.large_variant_local("sunset.jpg"), Some(true));
        assert_eq!(index.large_variant_local("river.mp4"), Some(false));
        assert_eq!(index.large_variant_local("other.png"), None);

        let item = sunset();
        assert_eq!(item.select_filename(true, Some(&index)), Some("sunset-4k.jpg"));
    }

    #[test]
    fn attribution_without_license_omits_parentheses() {
        let item = MediaItem {
            attribution: Some("NASA".to_string()),
            ..MediaItem::default()
        };
        assert_eq!(item.attribution_line().as_deref(), Some("© NASA"));
        assert_eq!(MediaItem::default().attribution_line(), None);
    }

    #[test]
    fn probe_leaves_flag_unknown_when_unreachable() {
        let mut catalog = catalog();
        let base = Url::parse("http://127.0.0.1:9/_media/").unwrap();
        let answered = probe_large_variants(&mut catalog, &base, 500).expect("client builds");
        assert_eq!(answered, 0);
        assert_eq!(catalog["sunset"].large_variant_local, None);
    }
}
