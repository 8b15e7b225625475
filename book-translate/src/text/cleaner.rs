//! Source text clean-up before segmentation.

use once_cell::sync::Lazy;
use regex::Regex;

static GUTENBERG_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\*\*\* ?START OF (?:THE|THIS) PROJECT GUTENBERG[^\n]*?\*\*\*[^\n]*\n?")
        .expect("valid regex")
});

static GUTENBERG_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\*\*\* ?END OF (?:THE|THIS) PROJECT GUTENBERG").expect("valid regex")
});

/// Normalise line endings and drop a leading byte-order mark.
pub fn normalize_source(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Remove the Project Gutenberg licence header and footer.
///
/// Everything up to and including the `*** START OF ... ***` line is dropped,
/// as is everything from the `*** END OF ...` line onwards. Text without the
/// markers is returned trimmed but otherwise untouched.
pub fn strip_gutenberg(text: &str) -> String {
    let body_start = GUTENBERG_START
        .find(text)
        .map(|m| m.end())
        .unwrap_or(0);
    let body = &text[body_start..];

    let body_end = GUTENBERG_END
        .find(body)
        .map(|m| m.start())
        .unwrap_or(body.len());

    body[..body_end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_source("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_normalize_strips_bom() {
        assert_eq!(normalize_source("\u{feff}Title\n"), "Title\n");
    }

    #[test]
    fn test_strip_gutenberg_markers() {
        let text = "The Project Gutenberg eBook of Something\n\
                    Licence blurb.\n\
                    *** START OF THE PROJECT GUTENBERG EBOOK SOMETHING ***\n\
                    \n\
                    CHAPTER I\n\
                    \n\
                    It was a dark night.\n\
                    \n\
                    *** END OF THE PROJECT GUTENBERG EBOOK SOMETHING ***\n\
                    More licence text.";

        let body = strip_gutenberg(text);
        assert_eq!(body, "CHAPTER I\n\nIt was a dark night.");
    }

    #[test]
    fn test_strip_gutenberg_without_markers() {
        assert_eq!(strip_gutenberg("  plain text \n"), "plain text");
    }
}
