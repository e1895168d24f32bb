// ABOUTME: HTML sanitizer for slide markdown and rendered handout HTML
// ABOUTME: Strips scripts, event handlers and dangerous URLs and hardens `_blank` links

use crate::errors::{Result, RevelationError};
use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, parse_document, serialize, Attribute, LocalName, QualName};
use log::{debug, warn};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Elements removed together with their content
pub const BLOCKED_TAGS: &[&str] = &["script", "object", "embed", "applet", "base", "meta"];

/// Attributes whose value is a URL
const URL_ATTRIBUTES: &[&str] = &["href", "src", "xlink:href", "formaction", "action", "poster"];

const DANGEROUS_SCHEMES: &[&str] = &[
    "javascript:",
    "vbscript:",
    "data:text/html",
    "data:application/javascript",
];

const SAFE_REL: [&str; 2] = ["noopener", "noreferrer"];

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static OBJECT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<object\b[^>]*>.*?</object\s*>").unwrap());
static APPLET_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<applet\b[^>]*>.*?</applet\s*>").unwrap());
static STRAY_BLOCKED_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?\s*(script|object|embed|applet|base|meta)\b[^>]*>").unwrap()
});
// Attribute names and unquoted values follow the HTML tokenizer: a quoted
// value may contain `>`, and `/` separates attributes like whitespace.
static START_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:[\s/]*[^\s/>][^\s/>=]*(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))?)*)([\s/]*)>"#,
    )
    .unwrap()
});
static TAG_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s/>][^\s/>=]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#).unwrap()
});
static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&#(x[0-9a-f]+|\d+);?").unwrap());
static NAMED_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)&(colon|tab|newline);").unwrap());

/// Upper bound on fixpoint passes over embedded markup
const MAX_PASSES: usize = 16;

/// Decode the entities commonly used to disguise a URL scheme
fn decode_entities(value: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(value, |caps: &Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    NAMED_ENTITY
        .replace_all(&numeric, |caps: &Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "colon" => ":",
                "tab" => "\t",
                _ => "\n",
            }
            .to_string()
        })
        .into_owned()
}

/// Lower-cased value with control characters and whitespace removed
fn compact(value: &str) -> String {
    decode_entities(value)
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_dangerous_url(value: &str) -> bool {
    let compacted = compact(value);
    DANGEROUS_SCHEMES
        .iter()
        .any(|scheme| compacted.starts_with(scheme))
}

fn is_dangerous_style(value: &str) -> bool {
    let compacted = compact(value);
    compacted.contains("expression(")
        || compacted.contains("@import")
        || ["url(javascript:", "url('javascript:", "url(\"javascript:"]
            .iter()
            .any(|pattern| compacted.contains(pattern))
}

/// Whether an attribute must be removed from any element
fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") || name == "srcdoc" {
        return true;
    }
    if URL_ATTRIBUTES.contains(&name.as_str()) {
        return is_dangerous_url(value);
    }
    name == "style" && is_dangerous_style(value)
}

/// Existing rel tokens plus `noopener noreferrer`, de-duplicated
fn merge_rel(existing: Option<&str>) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for token in existing
        .unwrap_or_default()
        .split_whitespace()
        .chain(SAFE_REL)
    {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(token)) {
            tokens.push(token.to_string());
        }
    }
    tokens.join(" ")
}

/// Sanitize an HTML fragment by parsing it into a DOM and serializing the
/// cleaned tree. Never fails: an unserializable tree yields an empty string.
pub fn sanitize_fragment(html: &str) -> String {
    let wrapped = format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        html
    );
    let dom = parse_document(RcDom::default(), Default::default()).one(wrapped);

    let Some(body) = find_element(&dom.document, "body") else {
        return String::new();
    };
    clean_tree(&body);

    match serialize_children(&body) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            warn!("Dropping fragment that could not be serialized: {}", e);
            String::new()
        }
    }
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { ref name, .. } = child.data {
            if &*name.local == tag {
                return Some(child.clone());
            }
        }
        if let Some(found) = find_element(child, tag) {
            return Some(found);
        }
    }
    None
}

fn is_blocked_element(handle: &Handle) -> bool {
    match handle.data {
        NodeData::Element { ref name, .. } => BLOCKED_TAGS.contains(&&*name.local),
        _ => false,
    }
}

fn clean_tree(handle: &Handle) {
    handle.children.borrow_mut().retain(|child| {
        let blocked = is_blocked_element(child);
        if blocked {
            debug!("Removed blocked element from fragment");
        }
        !blocked
    });

    for child in handle.children.borrow().iter() {
        if let NodeData::Element {
            ref name,
            ref attrs,
            ref template_contents,
            ..
        } = child.data
        {
            clean_attributes(&name.local, &mut attrs.borrow_mut());
            if let Some(contents) = template_contents.borrow().as_ref() {
                clean_tree(contents);
            }
        }
        clean_tree(child);
    }
}

fn attribute_name(attr: &Attribute) -> String {
    match attr.name.prefix {
        Some(ref prefix) => format!("{}:{}", prefix, attr.name.local),
        None => attr.name.local.to_string(),
    }
}

fn clean_attributes(element: &str, attrs: &mut Vec<Attribute>) {
    attrs.retain(|attr| {
        let name = attribute_name(attr);
        let unsafe_attr = is_unsafe_attribute(&name, &attr.value);
        if unsafe_attr {
            debug!("Removed attribute {} from <{}>", name, element);
        }
        !unsafe_attr
    });

    let opens_blank = element == "a"
        && attrs
            .iter()
            .any(|a| &*a.name.local == "target" && a.value.eq_ignore_ascii_case("_blank"));
    if !opens_blank {
        return;
    }

    match attrs.iter_mut().find(|a| &*a.name.local == "rel") {
        Some(rel) => {
            let merged = merge_rel(Some(&*rel.value));
            rel.value = merged.into();
        }
        None => attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from("rel")),
            value: merge_rel(None).into(),
        }),
    }
}

fn serialize_children(handle: &Handle) -> Result<String> {
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    let mut output = Vec::new();
    for child in handle.children.borrow().iter() {
        let serializable = SerializableHandle::from(child.clone());
        serialize(&mut output, &serializable, opts.clone())
            .map_err(|e| RevelationError::HtmlError(format!("HTML serialization failed: {}", e)))?;
    }
    String::from_utf8(output)
        .map_err(|e| RevelationError::HtmlError(format!("UTF-8 conversion failed: {}", e)))
}

/// Sanitize raw HTML embedded in markdown text.
///
/// Lines inside ``` fences are left alone. Everything else has script,
/// object and applet blocks removed, stray blocked tags dropped and the
/// attributes of every remaining start tag scrubbed. Passes repeat until
/// nothing changes, so removals cannot splice new tags together.
pub fn sanitize_embedded_markup(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut chunk: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in markdown.split('\n') {
        let ticks = line.bytes().take_while(|&b| b == b'`').count();
        let marker = (ticks >= 3).then(|| &line[..ticks]);

        match (fence, marker) {
            (None, Some(opening)) => {
                flush_chunk(&mut chunk, &mut out);
                fence = Some(opening);
                out.push(line.to_string());
            }
            (Some(open), Some(closing)) if open == closing => {
                fence = None;
                out.push(line.to_string());
            }
            (Some(_), _) => out.push(line.to_string()),
            (None, None) => chunk.push(line),
        }
    }
    flush_chunk(&mut chunk, &mut out);
    out.join("\n")
}

fn flush_chunk(chunk: &mut Vec<&str>, out: &mut Vec<String>) {
    if chunk.is_empty() {
        return;
    }
    let text = chunk.join("\n");
    chunk.clear();

    let mut current = text;
    for _ in 0..MAX_PASSES {
        let next = scrub_markup(&current);
        if next == current {
            break;
        }
        current = next;
    }
    out.push(current);
}

fn scrub_markup(text: &str) -> String {
    let mut cleaned = text.to_string();
    for block in [&*SCRIPT_BLOCK, &*OBJECT_BLOCK, &*APPLET_BLOCK] {
        if block.is_match(&cleaned) {
            debug!("Removed blocked element from embedded markup");
            cleaned = block.replace_all(&cleaned, "").into_owned();
        }
    }
    cleaned = STRAY_BLOCKED_TAG.replace_all(&cleaned, "").into_owned();
    START_TAG
        .replace_all(&cleaned, |caps: &Captures| {
            let whole = &caps[0];
            let attributes = caps.get(2).map_or("", |m| m.as_str());
            let self_closing = caps.get(3).is_some_and(|m| m.as_str().contains('/'));
            rewrite_tag(&caps[1], attributes, self_closing)
                .unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

/// Rebuilt start tag, or `None` when its attributes need no change
fn rewrite_tag(tag: &str, attributes: &str, self_closing: bool) -> Option<String> {
    let mut kept: Vec<&str> = Vec::new();
    let mut changed = false;
    let mut target_blank = false;
    let mut rel: Option<(usize, String)> = None;

    for caps in TAG_ATTRIBUTE.captures_iter(attributes) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());

        if is_unsafe_attribute(name, value) {
            debug!("Removed attribute {} from <{}>", name, tag);
            changed = true;
            continue;
        }
        if name.eq_ignore_ascii_case("target") && value.eq_ignore_ascii_case("_blank") {
            target_blank = true;
        }
        if name.eq_ignore_ascii_case("rel") {
            rel = Some((kept.len(), value.to_string()));
        }
        kept.push(caps.get(0).map_or("", |m| m.as_str()));
    }

    let mut rebuilt: Vec<String> = kept.iter().map(|a| a.to_string()).collect();
    if tag.eq_ignore_ascii_case("a") && target_blank {
        match rel {
            Some((index, ref value)) => {
                let merged = merge_rel(Some(value));
                if merged != *value {
                    rebuilt[index] = format!(r#"rel="{}""#, merged);
                    changed = true;
                }
            }
            None => {
                rebuilt.push(format!(r#"rel="{}""#, merge_rel(None)));
                changed = true;
            }
        }
    }

    if !changed {
        return None;
    }

    let mut tag_text = format!("<{}", tag);
    for attribute in &rebuilt {
        tag_text.push(' ');
        tag_text.push_str(attribute);
    }
    if self_closing {
        tag_text.push_str(" /");
    }
    tag_text.push('>');
    Some(tag_text)
}
