// ABOUTME: Slide segmentation of processed markdown for the handout path
// ABOUTME: Splits on break markers outside code fences, separates notes and tracks (h, v) indices

use crate::frontmatter::NoteSeparator;
use once_cell::sync::Lazy;
use regex::Regex;

static BREAK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\*\*\*|---)[ \t]*$").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HASHES_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+$").unwrap());

/// How a slide was reached from the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakType {
    Start,
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub content: String,
    pub break_type: BreakType,
}

/// Split processed markdown into slides.
///
/// A trimmed `---` line ends the current slide and makes the next one
/// vertical, `***` makes it horizontal. The trailing buffer is always
/// returned, even when empty.
pub fn segment(markdown: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;
    let mut break_type = BreakType::Start;

    for line in markdown.split('\n') {
        let ticks = line.bytes().take_while(|&b| b == b'`').count();
        if ticks >= 3 {
            let marker = &line[..ticks];
            match fence {
                None => fence = Some(marker),
                Some(open) if open == marker => fence = None,
                Some(_) => {}
            }
            current.push(line);
            continue;
        }

        let trimmed = line.trim();
        if fence.is_none() && (trimmed == "---" || trimmed == "***") {
            segments.push(Segment {
                content: current.join("\n"),
                break_type,
            });
            current.clear();
            break_type = if trimmed == "---" {
                BreakType::Vertical
            } else {
                BreakType::Horizontal
            };
            continue;
        }

        current.push(line);
    }

    segments.push(Segment {
        content: current.join("\n"),
        break_type,
    });
    segments
}

/// A slide body and its speaker notes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlideParts {
    pub content: String,
    pub notes: String,
}

/// Split a slide at the first notes separator line.
///
/// With the legacy separator any text after `Note:` on that line opens the
/// notes.
pub fn split_notes(raw: &str, separator: NoteSeparator) -> SlideParts {
    let lines: Vec<&str> = raw.lines().collect();
    let Some(index) = lines.iter().position(|line| separator.matches(line)) else {
        return SlideParts {
            content: raw.to_string(),
            notes: String::new(),
        };
    };

    let mut notes: Vec<&str> = Vec::new();
    if separator == NoteSeparator::Legacy {
        let rest = lines[index].get(separator.token().len()..).unwrap_or("").trim();
        if !rest.is_empty() {
            notes.push(rest);
        }
    }
    notes.extend(&lines[index + 1..]);

    SlideParts {
        content: lines[..index].join("\n"),
        notes: notes.join("\n"),
    }
}

/// Drop leftover break marker lines and surrounding whitespace
pub fn clean_markdown(text: &str) -> String {
    BREAK_LINE.replace_all(text, "").trim().to_string()
}

/// Nothing worth a handout page: empty, only `#`s, or only comments
pub fn is_blank_slide(content: &str) -> bool {
    content.is_empty()
        || HASHES_ONLY.is_match(content)
        || HTML_COMMENT.replace_all(content, "").trim().is_empty()
}

/// Reveal.js coordinates of a slide, both starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideIndex {
    pub h: usize,
    pub v: usize,
}

impl SlideIndex {
    pub fn label(self) -> String {
        format!("{}.{}", self.h, self.v)
    }
}

/// Walks segments and yields their coordinates
#[derive(Debug, Default)]
pub struct SlideIndexer {
    current: Option<SlideIndex>,
}

impl SlideIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, break_type: BreakType) -> SlideIndex {
        let next = match (self.current, break_type) {
            (None, _) => SlideIndex { h: 1, v: 1 },
            (Some(prev), BreakType::Vertical) => SlideIndex {
                h: prev.h,
                v: prev.v + 1,
            },
            (Some(prev), _) => SlideIndex { h: prev.h + 1, v: 1 },
        };
        self.current = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_break_markers_and_keeps_trailing_slide() {
        let slides = segment("# One\n---\n## Two\n***\n");
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].content, "# One");
        assert_eq!(slides[0].break_type, BreakType::Start);
        assert_eq!(slides[1].break_type, BreakType::Vertical);
        assert_eq!(slides[2].break_type, BreakType::Horizontal);
        assert_eq!(slides[2].content, "");
    }

    #[test]
    fn fenced_markers_do_not_split() {
        let slides = segment("````\n---\n```\n***\n````\nafter");
        assert_eq!(slides.len(), 1);
        assert!(slides[0].content.contains("***"));
    }

    #[test]
    fn indices_follow_reveal_coordinates() {
        let mut indexer = SlideIndexer::new();
        let labels: Vec<String> = [
            BreakType::Start,
            BreakType::Vertical,
            BreakType::Vertical,
            BreakType::Horizontal,
            BreakType::Vertical,
        ]
        .into_iter()
        .map(|b| indexer.advance(b).label())
        .collect();
        assert_eq!(labels, ["1.1", "1.2", "1.3", "2.1", "2.2"]);
    }

    #[test]
    fn notes_split_on_current_separator() {
        let parts = split_notes("# Slide\nBody\n:note:\nSay hello", NoteSeparator::Current);
        assert_eq!(parts.content, "# Slide\nBody");
        assert_eq!(parts.notes, "Say hello");

        let parts = split_notes("# Slide\nNote: inline", NoteSeparator::Current);
        assert_eq!(parts.notes, "");
    }

    #[test]
    fn legacy_separator_keeps_text_on_its_line() {
        let parts = split_notes("Body\nNote: first thought\nsecond", NoteSeparator::Legacy);
        assert_eq!(parts.content, "Body");
        assert_eq!(parts.notes, "first thought\nsecond");
    }

    #[test]
    fn blank_slides_are_detected() {
        assert!(is_blank_slide(""));
        assert!(is_blank_slide("##"));
        assert!(is_blank_slide("<!-- .slide: data-darkbg -->\n<!-- more -->"));
        assert!(!is_blank_slide("# Real"));
        assert_eq!(clean_markdown("\n***\ntext\n  ---  \n"), "text");
    }
}
