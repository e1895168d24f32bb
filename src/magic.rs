// ABOUTME: Magic image directives for slide documents
// ABOUTME: Turns `![keyword:modifier](src)` lines into backgrounds, embeds and figures

use once_cell::sync::Lazy;
use regex::Regex;

static MAGIC_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^!\[([a-zA-Z0-9_-]+)(?::([a-zA-Z0-9_ -]+))?\]\((.+?)\)$").unwrap()
});
static VIDEO_SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(webm|mp4|mov|m4v)$").unwrap());
static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtu\.be/|youtube\.com/(?:embed/|watch\?v=))([\w-]+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicImageKind {
    Background,
    Fit,
    YouTube,
    Caption,
}

impl MagicImageKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "background" => Some(MagicImageKind::Background),
            "fit" => Some(MagicImageKind::Fit),
            "youtube" => Some(MagicImageKind::YouTube),
            "caption" => Some(MagicImageKind::Caption),
            _ => None,
        }
    }

    /// Handouts never embed live media, so only captions apply there
    pub fn available_in_handout(self) -> bool {
        matches!(self, MagicImageKind::Caption)
    }
}

/// A parsed magic image line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicImage {
    pub kind: MagicImageKind,
    pub modifier: String,
    pub src: String,
}

impl MagicImage {
    /// Parse a whole line; unknown keywords are ordinary images
    pub fn parse(line: &str) -> Option<Self> {
        let caps = MAGIC_IMAGE.captures(line)?;
        let kind = MagicImageKind::from_keyword(&caps[1])?;
        Some(Self {
            kind,
            modifier: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            src: caps[3].to_string(),
        })
    }

    pub fn is_sticky(&self) -> bool {
        self.kind == MagicImageKind::Background && self.modifier == "sticky"
    }

    pub fn render(&self) -> String {
        let src = &self.src;
        match self.kind {
            MagicImageKind::Background => {
                if is_video(src) {
                    format!(
                        r#"<!-- .slide: data-background-video="{}" data-background-video-loop -->"#,
                        src
                    )
                } else {
                    format!(r#"<!-- .slide: data-background-image="{}" -->"#, src)
                }
            }
            MagicImageKind::Fit => {
                if is_video(src) {
                    format!(
                        r#"<video src="{}" data-imagefit autoplay loop muted playsinline></video>"#,
                        src
                    )
                } else {
                    format!("![]({})<!-- .element data-imagefit -->", src)
                }
            }
            MagicImageKind::YouTube => match YOUTUBE_ID.captures(src) {
                Some(caps) => {
                    let id = &caps[1];
                    format!(
                        r#"<iframe width="960" height="540" src="https://www.youtube.com/embed/{id}?autoplay=0&mute=1&loop=1&playlist={id}" frameborder="0" allowfullscreen></iframe>"#
                    )
                }
                None => format!("<!-- Invalid YouTube URL: {} -->", src),
            },
            MagicImageKind::Caption => format!(
                "<figure class=\"captioned-image\">\n  <img src=\"{}\" alt=\"\">\n  <figcaption>{}</figcaption>\n</figure>",
                src, self.modifier
            ),
        }
    }
}

fn is_video(src: &str) -> bool {
    VIDEO_SOURCE.is_match(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyword_modifier_and_source() {
        let image = MagicImage::parse("![Background:sticky](../_media/sunset.jpg)").unwrap();
        assert_eq!(image.kind, MagicImageKind::Background);
        assert_eq!(image.modifier, "sticky");
        assert_eq!(image.src, "../_media/sunset.jpg");
        assert!(image.is_sticky());
    }

    #[test]
    fn unknown_keywords_are_plain_images() {
        assert_eq!(MagicImage::parse("![diagram](chart.png)"), None);
        assert_eq!(MagicImage::parse("see ![fit](x.png)"), None);
    }

    #[test]
    fn background_distinguishes_video() {
        let image = MagicImage::parse("![background](clip.MP4)").unwrap();
        assert_eq!(
            image.render(),
            r#"<!-- .slide: data-background-video="clip.MP4" data-background-video-loop -->"#
        );
        let image = MagicImage::parse("![background](still.png)").unwrap();
        assert_eq!(
            image.render(),
            r#"<!-- .slide: data-background-image="still.png" -->"#
        );
    }

    #[test]
    fn fit_supports_images_and_video() {
        let image = MagicImage::parse("![fit](photo.jpg)").unwrap();
        assert_eq!(image.render(), "![](photo.jpg)<!-- .element data-imagefit -->");
        let video = MagicImage::parse("![fit](loop.webm)").unwrap();
        assert!(video.render().starts_with(r#"<video src="loop.webm" data-imagefit"#));
    }

    #[test]
    fn youtube_embeds_by_id() {
        let image = MagicImage::parse("![youtube](https://www.youtube.com/watch?v=dQw4w9WgXcQ)").unwrap();
        let html = image.render();
        assert!(html.contains("https://www.youtube.com/embed/dQw4w9WgXcQ?"));
        assert!(html.contains("playlist=dQw4w9WgXcQ"));

        let broken = MagicImage::parse("![youtube](https://example.com/video)").unwrap();
        assert_eq!(
            broken.render(),
            "<!-- Invalid YouTube URL: https://example.com/video -->"
        );
    }

    #[test]
    fn caption_wraps_figure() {
        let image = MagicImage::parse("![caption:The harbour at dawn](harbour.jpg)").unwrap();
        assert_eq!(
            image.render(),
            "<figure class=\"captioned-image\">\n  <img src=\"harbour.jpg\" alt=\"\">\n  <figcaption>The harbour at dawn</figcaption>\n</figure>"
        );
    }
}
