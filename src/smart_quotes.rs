// ABOUTME: Typographic quote conversion for processed slide markdown
// ABOUTME: Curls straight quotes in prose while leaving code, markup and macros untouched

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Regions copied through unchanged, masked in this order
static PROTECTED: Lazy<[Regex; 5]> = Lazy::new(|| {
    [
        Regex::new(r"(?s)```.*?```").unwrap(),
        Regex::new(r"`[^`]*`").unwrap(),
        Regex::new(r"(?s)<!--.*?-->").unwrap(),
        Regex::new(r"<[^>]+>").unwrap(),
        Regex::new(r"\{\{[^}]+\}\}").unwrap(),
    ]
});
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").unwrap());

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// Replace `"` and `'` with “ ” and ‘ ’ outside protected regions.
///
/// A quote opens when it follows a non-word character (or the start) and
/// precedes a non-space; otherwise it closes when it precedes a non-word
/// character (or the end). Apostrophes inside words stay straight.
pub fn convert_smart_quotes(text: &str) -> String {
    let mut protected: Vec<String> = Vec::new();
    let mut masked = text.to_string();
    for pattern in PROTECTED.iter() {
        masked = pattern
            .replace_all(&masked, |caps: &Captures| {
                protected.push(caps[0].to_string());
                format!("{}{}{}", OPEN, protected.len() - 1, CLOSE)
            })
            .into_owned();
    }

    let mut converted = curl(&masked);

    // Protected regions can contain earlier placeholders
    for _ in 0..=protected.len() {
        if !converted.contains(OPEN) {
            break;
        }
        converted = PLACEHOLDER
            .replace_all(&converted, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| protected.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
    }
    converted
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn curl(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        let (open, close) = match c {
            '"' => ('“', '”'),
            '\'' => ('‘', '’'),
            _ => {
                out.push(c);
                continue;
            }
        };
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();

        if prev.map_or(true, |p| !is_word(p)) && next.is_some_and(|n| !n.is_whitespace()) {
            out.push(open);
        } else if next.map_or(true, |n| !is_word(n)) {
            out.push(close);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curls_double_and_single_quotes() {
        assert_eq!(
            convert_smart_quotes(r#"She said "hello" and 'bye'."#),
            "She said “hello” and ‘bye’."
        );
    }

    #[test]
    fn apostrophes_inside_words_stay_straight() {
        assert_eq!(convert_smart_quotes("don't stop"), "don't stop");
        assert_eq!(convert_smart_quotes("the dogs' bowls"), "the dogs’ bowls");
    }

    #[test]
    fn code_and_markup_are_protected() {
        let text = "```\nprint(\"raw\")\n```\nUse `a = \"b\"` here <img alt=\"x\"> {{attrib:\"Name\"}} <!-- \"c\" -->";
        assert_eq!(convert_smart_quotes(text), text);
    }

    #[test]
    fn quotes_next_to_protected_regions() {
        assert_eq!(
            convert_smart_quotes(r#""<b>bold</b>" text"#),
            "“<b>bold</b>” text"
        );
    }

    #[test]
    fn conversion_is_idempotent() {
        let once = convert_smart_quotes(r#"A "quoted" line with 'single' marks"#);
        assert_eq!(convert_smart_quotes(&once), once);
    }
}
