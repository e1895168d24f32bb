// ABOUTME: Markdown preprocessor turning slide documents into Reveal.js markdown
// ABOUTME: Classifies each line into an event and folds the events through per-slide state

use crate::config::AppConfig;
use crate::frontmatter::NoteSeparator;
use crate::macros::{MacroTable, COLUMN_CYCLE};
use crate::magic::MagicImage;
use crate::media::{MediaAvailability, MediaCatalog, MediaResolver};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::mem;

static BLOCK_MACRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{([A-Za-z0-9_]+)(?::([^}]+))?\}\}$").unwrap());
static INLINE_MACRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z0-9_]+):(?:(.*):)?$").unwrap());
static ATTRIBUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:ATTRIB:(.*)$").unwrap());
static STICKY_ATTRIBUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:STICKY-ATTRIB:(.*)$").unwrap());
static HTML_COMMENT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<!--.*?-->$").unwrap());
static SLIDE_TRANSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<!--\s*\.slide:.*?\bdata-transition="([^"]+)""#).unwrap());
static MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static HTML_MEDIA_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(img|video|audio|iframe|source|picture|embed|object)\b").unwrap()
});

const AI_MARKER: &str = ":AI:";
const STICKY_AI_MARKER: &str = ":STICKY-AI:";
const FRAGMENT_SUFFIX: &str = r#" <!-- .element: class="fragment" -->"#;

/// Inline tokens filled from settings; left as text when no value is set
const SETTING_TOKENS: &[&str] = &["ccli"];

/// Per-call switches for [`preprocess`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOptions {
    /// Drop live media and skip embeds that only make sense on screen
    pub handout: bool,
    /// Start a new slide before `#`, `##` and `###` headings
    pub new_slide_on_heading: bool,
    /// `None` defers to [`AppConfig::prefers_high_bitrate`]
    pub prefer_high_bitrate: Option<bool>,
    /// Drop every visual directive (lower-thirds overlay output)
    pub suppress_visuals: bool,
    pub note_separator: NoteSeparator,
    pub availability: Option<MediaAvailability>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            handout: false,
            new_slide_on_heading: true,
            prefer_high_bitrate: None,
            suppress_visuals: false,
            note_separator: NoteSeparator::default(),
            availability: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// `***`
    Horizontal,
    /// `---`
    Vertical,
    /// Speaker-notes separator
    Notes,
    /// End of document
    End,
}

/// What a single non-fenced line means to the preprocessor
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent<'a> {
    /// `{{}}`
    BlankReset,
    /// `||`
    ColumnPipe,
    MagicImage(MagicImage),
    /// `{{key:p1:p2}}` or `:key:p1:p2:`
    MacroUse { key: &'a str, params: Vec<&'a str> },
    Attribution(&'a str),
    StickyAttribution(&'a str),
    AiBadge,
    StickyAiBadge,
    Heading { vertical: bool },
    SlideBreak(BreakKind),
    /// Line text with the trailing `++` removed
    Fragment(&'a str),
    Plain,
}

/// Classify a line that is outside any code fence.
///
/// Directive tags and the notes separator are matched before the inline
/// macro syntax they would otherwise collide with.
pub fn classify(line: &str, note_separator: NoteSeparator) -> LineEvent<'_> {
    if line == "{{}}" {
        return LineEvent::BlankReset;
    }
    if line.trim() == "||" {
        return LineEvent::ColumnPipe;
    }
    if let Some(image) = MagicImage::parse(line) {
        return LineEvent::MagicImage(image);
    }
    if let Some(caps) = BLOCK_MACRO.captures(line) {
        return macro_use(&caps);
    }
    if let Some(caps) = STICKY_ATTRIBUTION.captures(line) {
        return LineEvent::StickyAttribution(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = ATTRIBUTION.captures(line) {
        return LineEvent::Attribution(caps.get(1).map_or("", |m| m.as_str()));
    }
    if line == STICKY_AI_MARKER {
        return LineEvent::StickyAiBadge;
    }
    if line == AI_MARKER {
        return LineEvent::AiBadge;
    }
    if note_separator.matches(line) {
        return LineEvent::SlideBreak(BreakKind::Notes);
    }
    if let Some(caps) = inline_macro(line) {
        return macro_use(&caps);
    }
    if let Some(depth) = heading_depth(line) {
        return LineEvent::Heading {
            vertical: depth == 3,
        };
    }
    match line {
        "---" => return LineEvent::SlideBreak(BreakKind::Vertical),
        "***" => return LineEvent::SlideBreak(BreakKind::Horizontal),
        _ => {}
    }
    if let Some(text) = line.strip_suffix("++") {
        return LineEvent::Fragment(text.trim_end());
    }
    LineEvent::Plain
}

fn inline_macro(line: &str) -> Option<regex::Captures<'_>> {
    INLINE_MACRO
        .captures(line)
        .filter(|caps| !SETTING_TOKENS.contains(&caps[1].trim()))
}

fn macro_use<'a>(caps: &regex::Captures<'a>) -> LineEvent<'a> {
    let key = caps.get(1).map_or("", |m| m.as_str()).trim();
    let params = caps
        .get(2)
        .map(|m| m.as_str().split(':').collect())
        .unwrap_or_default();
    LineEvent::MacroUse { key, params }
}

/// `#`, `##` or `###` followed by a space and not by another `#`
fn heading_depth(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let after = line[hashes..].strip_prefix(' ')?;
    if after.starts_with('#') {
        return None;
    }
    Some(hashes)
}

fn is_attribution_carrier(line: &str) -> Option<&str> {
    ATTRIBUTION
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Lines dropped when visuals are suppressed
fn is_visual(line: &str) -> bool {
    BLOCK_MACRO.is_match(line)
        || inline_macro(line).is_some()
        || line.starts_with(":ATTRIB:")
        || line.starts_with(":STICKY-ATTRIB:")
        || line == AI_MARKER
        || line == STICKY_AI_MARKER
        || MARKDOWN_IMAGE.is_match(line)
        || HTML_MEDIA_TAG.is_match(line)
        || line.contains("data-background-audio")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ColumnCursor {
    #[default]
    Start,
    Break,
    End,
}

impl ColumnCursor {
    /// Template to emit for the next `||`, advancing the cycle
    fn advance(&mut self) -> &'static str {
        let (name, next) = match self {
            ColumnCursor::Start => (COLUMN_CYCLE[0], ColumnCursor::Break),
            ColumnCursor::Break => (COLUMN_CYCLE[1], ColumnCursor::End),
            ColumnCursor::End => (COLUMN_CYCLE[2], ColumnCursor::Start),
        };
        *self = next;
        name
    }

    fn is_open(self) -> bool {
        self != ColumnCursor::Start
    }
}

/// Running state of one preprocessing pass
struct SlideState<'a> {
    macros: &'a MacroTable,
    resolver: MediaResolver<'a>,
    options: &'a PreprocessOptions,
    ccli: Option<&'a str>,
    out: Vec<String>,
    fence: Option<String>,
    this_macros: Vec<String>,
    last_macros: Vec<String>,
    attributions: Vec<String>,
    column: ColumnCursor,
    pending_transition: Option<String>,
    ai_badge: bool,
    blank_slide: bool,
    previous_break: Option<BreakKind>,
}

impl<'a> SlideState<'a> {
    fn new(
        macros: &'a MacroTable,
        media: &'a MediaCatalog,
        options: &'a PreprocessOptions,
        app: &'a AppConfig,
    ) -> Self {
        let resolver = MediaResolver {
            catalog: media,
            availability: options.availability.as_ref(),
            base_path: &app.media_base_path,
            prefer_high_bitrate: app.prefers_high_bitrate(options.prefer_high_bitrate),
        };
        Self {
            macros,
            resolver,
            options,
            ccli: app.ccli.as_deref(),
            out: Vec::new(),
            fence: None,
            this_macros: Vec::new(),
            last_macros: Vec::new(),
            attributions: Vec::new(),
            column: ColumnCursor::default(),
            pending_transition: None,
            ai_badge: false,
            blank_slide: true,
            previous_break: None,
        }
    }

    /// Track ``` fences; true when the line belongs to a code block
    fn in_fence(&mut self, line: &str) -> bool {
        let ticks = line.bytes().take_while(|&b| b == b'`').count();
        if ticks >= 3 {
            let marker = &line[..ticks];
            match &self.fence {
                None => self.fence = Some(marker.to_string()),
                Some(open) if open == marker => self.fence = None,
                Some(_) => {}
            }
            return true;
        }
        self.fence.is_some()
    }

    fn process_line(&mut self, raw: &str) {
        if self.in_fence(raw) {
            self.out.push(raw.to_string());
            return;
        }

        let line = match self.ccli {
            Some(ccli) if raw.contains(":ccli:") => Cow::Owned(raw.replace(":ccli:", ccli)),
            _ => Cow::Borrowed(raw),
        };

        let separator = self.options.note_separator;
        if self.options.suppress_visuals && !separator.matches(&line) && is_visual(&line) {
            return;
        }

        let mut media_attribution = None;
        let line = if MediaResolver::contains_alias(&line) {
            if self.options.handout {
                return;
            }
            let resolved = self.resolver.resolve_line(&line);
            media_attribution = resolved.attributions.first().cloned();
            self.attributions.extend(resolved.attributions);
            Cow::Owned(resolved.line)
        } else {
            line
        };

        match classify(&line, separator) {
            LineEvent::BlankReset => {
                self.this_macros.clear();
                self.last_macros.clear();
            }
            LineEvent::ColumnPipe => {
                let name = self.column.advance();
                if let Some(lines) = self.macros.expand(name, &[]) {
                    for expanded in lines {
                        self.emit_directive(expanded);
                    }
                }
                self.blank_slide = false;
            }
            LineEvent::MagicImage(image) if self.options.handout && !image.kind.available_in_handout() => {
                self.emit_text(&line);
            }
            LineEvent::MagicImage(image) => {
                let rendered = image.render();
                if image.is_sticky() {
                    self.last_macros.clear();
                    self.this_macros.push(rendered.clone());
                    if let Some(attribution) = media_attribution {
                        self.this_macros.push(format!(":ATTRIB:{}", attribution));
                    }
                }
                self.out.push(rendered);
            }
            LineEvent::MacroUse { key, params } => self.invoke_macro(key, &params),
            LineEvent::Attribution(text) => self.attributions.push(text.to_string()),
            LineEvent::StickyAttribution(text) => {
                self.attributions.push(text.to_string());
                self.this_macros.push(format!(":ATTRIB:{}", text));
            }
            LineEvent::AiBadge => self.ai_badge = true,
            LineEvent::StickyAiBadge => {
                self.ai_badge = true;
                self.this_macros.push(AI_MARKER.to_string());
            }
            LineEvent::Heading { vertical } => {
                if self.options.new_slide_on_heading && !self.blank_slide {
                    let (kind, marker) = if vertical {
                        (BreakKind::Vertical, "---")
                    } else {
                        (BreakKind::Horizontal, "***")
                    };
                    self.flush(kind);
                    self.out.push(marker.to_string());
                    self.out.push(String::new());
                }
                self.emit_text(&line);
                self.blank_slide = false;
            }
            LineEvent::SlideBreak(kind) => {
                self.flush(kind);
                self.out.push(line.to_string());
                self.blank_slide = true;
            }
            LineEvent::Fragment(text) => {
                let annotated = format!("{}{}", text, FRAGMENT_SUFFIX);
                self.mark_content(&line);
                self.emit(annotated);
            }
            LineEvent::Plain => self.emit_text(&line),
        }
    }

    fn invoke_macro(&mut self, key: &str, params: &[&str]) {
        let Some(lines) = self.macros.expand(key, params) else {
            warn!("Markdown macro not found: {}", key);
            return;
        };

        let sticky = !MacroTable::is_structural(key);
        if sticky {
            self.last_macros.clear();
        }
        for expanded in lines {
            if sticky {
                self.this_macros.push(expanded.clone());
            }
            self.emit_directive(expanded);
        }
        self.blank_slide = false;
    }

    /// Route a macro output line to the attribution list, the AI flag or the output
    fn emit_directive(&mut self, line: String) {
        if let Some(text) = is_attribution_carrier(&line) {
            self.attributions.push(text.to_string());
        } else if line == AI_MARKER {
            self.ai_badge = true;
        } else {
            self.emit(line);
        }
    }

    fn emit_text(&mut self, line: &str) {
        match line.strip_suffix("++") {
            Some(text) => self.emit(format!("{}{}", text.trim_end(), FRAGMENT_SUFFIX)),
            None => self.emit(line.to_string()),
        }
        self.mark_content(line);
    }

    fn mark_content(&mut self, line: &str) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !HTML_COMMENT_LINE.is_match(trimmed) {
            self.blank_slide = false;
        }
    }

    fn emit(&mut self, line: String) {
        self.capture_transition(&line);
        self.out.push(line);
    }

    fn capture_transition(&mut self, line: &str) {
        if let Some(caps) = SLIDE_TRANSITION.captures(line) {
            self.pending_transition = Some(caps[1].to_string());
        }
    }

    /// Close the current slide: sticky carry-over, attributions, AI badge
    /// and the stack marker, in that order
    fn flush(&mut self, kind: BreakKind) {
        if self.column.is_open() {
            warn!("Unclosed column section at slide break, resetting column layout");
            self.column = ColumnCursor::Start;
        }

        if !self.this_macros.is_empty() {
            self.last_macros = mem::take(&mut self.this_macros);
        } else if !self.last_macros.is_empty() {
            for carried in mem::take(&mut self.last_macros) {
                if let Some(text) = is_attribution_carrier(&carried) {
                    self.attributions.push(text.to_string());
                } else if carried == AI_MARKER {
                    self.ai_badge = true;
                } else {
                    self.capture_transition(&carried);
                    self.out.push(carried);
                }
            }
            self.out.push(String::new());
        }

        if !self.attributions.is_empty() {
            self.out.push(r#"<div class="slide-attribution">"#.to_string());
            for attribution in mem::take(&mut self.attributions) {
                self.out
                    .push(format!(r#"<div class="attribution">{}</div>"#, attribution));
            }
            self.out.push("</div>".to_string());
            self.out.push(String::new());
        }

        if self.ai_badge {
            self.out.push(r#"<div class="slide-ai-symbol">"#.to_string());
            self.out.push(r#"<div class="ai-symbol">AI</div>"#.to_string());
            self.out.push("</div>".to_string());
            self.out.push(String::new());
        }

        if kind == BreakKind::Vertical && self.previous_break != Some(BreakKind::Vertical) {
            if let Some(transition) = self.pending_transition.as_deref() {
                self.out.push(format!(
                    r#"<div class="revelation-stack-attrs" data-stack-attrs="data-transition=&quot;{}&quot;"></div>"#,
                    transition
                ));
                self.out.push(String::new());
            }
        }
        if matches!(kind, BreakKind::Horizontal | BreakKind::Vertical) {
            self.previous_break = Some(kind);
        }

        self.this_macros.clear();
        self.pending_transition = None;
        self.ai_badge = false;
    }

    fn finish(mut self) -> String {
        self.flush(BreakKind::End);
        self.out.join("\n")
    }
}

/// Expand a slide document body into Reveal.js markdown.
///
/// Never fails: unknown macros are logged and dropped, unresolvable media
/// aliases stay in the text, and lines inside ``` fences are copied verbatim.
pub fn preprocess(
    markdown: &str,
    macros: &MacroTable,
    media: &MediaCatalog,
    options: &PreprocessOptions,
    app: &AppConfig,
) -> String {
    let mut state = SlideState::new(macros, media, options, app);
    for line in markdown.split('\n') {
        state.process_line(line);
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(markdown: &str) -> String {
        preprocess(
            markdown,
            &MacroTable::builtin(),
            &MediaCatalog::new(),
            &PreprocessOptions::default(),
            &AppConfig::default(),
        )
    }

    #[test]
    fn classifies_each_directive() {
        let sep = NoteSeparator::Current;
        assert_eq!(classify("{{}}", sep), LineEvent::BlankReset);
        assert_eq!(classify("  ||  ", sep), LineEvent::ColumnPipe);
        assert_eq!(
            classify("{{hymn:Amazing Grace:Newton}}", sep),
            LineEvent::MacroUse {
                key: "hymn",
                params: vec!["Amazing Grace", "Newton"]
            }
        );
        assert_eq!(
            classify(":darkbg:", sep),
            LineEvent::MacroUse {
                key: "darkbg",
                params: vec![]
            }
        );
        assert_eq!(
            classify(":audioloop:theme.mp3:", sep),
            LineEvent::MacroUse {
                key: "audioloop",
                params: vec!["theme.mp3"]
            }
        );
        assert_eq!(classify(":ATTRIB:Photo", sep), LineEvent::Attribution("Photo"));
        assert_eq!(
            classify(":STICKY-ATTRIB:Photo", sep),
            LineEvent::StickyAttribution("Photo")
        );
        assert_eq!(classify(":AI:", sep), LineEvent::AiBadge);
        assert_eq!(classify(":STICKY-AI:", sep), LineEvent::StickyAiBadge);
        assert_eq!(classify(":note:", sep), LineEvent::SlideBreak(BreakKind::Notes));
        assert_eq!(classify("## Two", sep), LineEvent::Heading { vertical: false });
        assert_eq!(classify("### Three", sep), LineEvent::Heading { vertical: true });
        assert_eq!(classify("#### Four", sep), LineEvent::Plain);
        assert_eq!(classify("# #hashtag", sep), LineEvent::Plain);
        assert_eq!(classify("---", sep), LineEvent::SlideBreak(BreakKind::Vertical));
        assert_eq!(classify("***", sep), LineEvent::SlideBreak(BreakKind::Horizontal));
        assert_eq!(classify("- point ++", sep), LineEvent::Fragment("- point"));
        assert_eq!(classify("just text", sep), LineEvent::Plain);
    }

    #[test]
    fn legacy_separator_is_a_prefix_match() {
        assert_eq!(
            classify("Note: speak slowly", NoteSeparator::Legacy),
            LineEvent::SlideBreak(BreakKind::Notes)
        );
        assert_eq!(classify("Note: speak slowly", NoteSeparator::Current), LineEvent::Plain);
    }

    #[test]
    fn column_pipes_cycle_through_templates() {
        let out = run("||\nleft\n||\nright\n||");
        assert_eq!(
            out,
            "<div class=\"flexcontainer\"><div class=\"first\">\nleft\n</div><div class=\"second\">\nright\n</div></div>"
        );
    }

    #[test]
    fn unclosed_columns_reset_at_break() {
        let out = run("||\nleft\n---\n||\nagain");
        let starts = out.matches(r#"<div class="flexcontainer"><div class="first">"#).count();
        assert_eq!(starts, 2, "second slide should reopen columns: {}", out);
        assert!(!out.contains(r#"</div><div class="second">"#));
    }

    #[test]
    fn fragment_suffix_is_annotated() {
        assert_eq!(
            run("- first ++"),
            r#"- first <!-- .element: class="fragment" -->"#
        );
    }

    #[test]
    fn unknown_macros_are_dropped() {
        assert_eq!(run("before\n{{nosuchmacro}}\nafter"), "before\nafter");
    }

    #[test]
    fn ccli_setting_is_substituted() {
        let app = AppConfig {
            ccli: Some("123456".to_string()),
            ..AppConfig::default()
        };
        let out = preprocess(
            "CCLI License :ccli:",
            &MacroTable::builtin(),
            &MediaCatalog::new(),
            &PreprocessOptions::default(),
            &app,
        );
        assert_eq!(out, "CCLI License 123456");
        assert_eq!(run("CCLI License :ccli:"), "CCLI License :ccli:");
    }

    #[test]
    fn unset_ccli_line_is_kept_as_text() {
        assert_eq!(classify(":ccli:", NoteSeparator::Current), LineEvent::Plain);
        assert_eq!(run("Licence\n:ccli:\nend"), "Licence\n:ccli:\nend");

        let options = PreprocessOptions {
            suppress_visuals: true,
            ..PreprocessOptions::default()
        };
        let out = preprocess(
            "Licence\n:ccli:",
            &MacroTable::builtin(),
            &MediaCatalog::new(),
            &options,
            &AppConfig::default(),
        );
        assert_eq!(out, "Licence\n:ccli:");
    }

    #[test]
    fn heading_break_keeps_fragment_annotation() {
        assert_eq!(
            run("Intro\n# Title ++"),
            "Intro\n***\n\n# Title <!-- .element: class=\"fragment\" -->"
        );
    }

    #[test]
    fn ai_badge_is_emitted_before_break() {
        let out = run(":AI:\nGenerated art\n***\nNext");
        let badge = out.find(r#"<div class="slide-ai-symbol">"#).expect("badge present");
        let marker = out.find("***").unwrap();
        assert!(badge < marker);
        assert_eq!(out.matches("slide-ai-symbol").count(), 1);
    }

    #[test]
    fn stack_marker_carries_pending_transition() {
        let out = run("{{transition:zoom}}\nFirst\n---\nSecond\n---\nThird");
        let marker = r#"<div class="revelation-stack-attrs" data-stack-attrs="data-transition=&quot;zoom&quot;"></div>"#;
        assert_eq!(out.matches(marker).count(), 1, "{}", out);
        assert!(out.find(marker).unwrap() < out.find("---").unwrap());
    }

    #[test]
    fn heading_break_respects_blank_slide() {
        let out = run("# One\ntext\n### Two");
        assert_eq!(out, "# One\ntext\n---\n\n### Two");
        let out = run("# Only");
        assert_eq!(out, "# Only");
    }
}
