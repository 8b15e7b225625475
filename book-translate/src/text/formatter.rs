//! Book-style formatting of translated text.
//!
//! The title and metadata checks are heuristics: short, shouty or label-like
//! lines are left alone, prose is re-wrapped.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default wrap width in characters.
pub const DEFAULT_LINE_WIDTH: usize = 80;

/// Lines shorter than this may be titles.
const TITLE_MAX_CHARS: usize = 60;
/// Indented lines shorter than this are kept as metadata.
const INDENTED_MAX_CHARS: usize = 100;

const TITLE_PREFIXES: &[&str] = &["CHAPTER", "Chapter", "BAB", "Bab"];
const METADATA_PREFIXES: &[&str] = &["Author", "Penulis", "Credit", "Kredit", "Release", "Tarikh"];

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)#{1,6}[ \t]*").expect("valid regex"));
static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("valid regex"));
static INLINE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

/// Clean markup and re-wrap prose for a plain-text book.
pub fn format_book_output(text: &str, line_width: usize) -> String {
    let text = BOLD.replace_all(text, "$1");
    let text = HEADING.replace_all(&text, "$1");
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    let text = INLINE_WHITESPACE.replace_all(&text, " ");

    let formatted: Vec<String> = text
        .trim()
        .split('\n')
        .map(|line| format_line(line, line_width))
        .collect();

    EXCESS_BLANK_LINES
        .replace_all(&formatted.join("\n"), "\n\n")
        .trim()
        .to_string()
}

fn format_line(line: &str, width: usize) -> String {
    let stripped = line.trim();
    if stripped.is_empty() {
        return String::new();
    }

    if is_title(stripped) {
        return stripped.to_string();
    }

    let indent = &line[..line.len() - line.trim_start().len()];
    let length = stripped.chars().count();

    if !indent.is_empty() && is_indented_metadata(stripped) {
        if length > width {
            let hanging = " ".repeat(indent.chars().count());
            return wrap(stripped, width, indent, &hanging);
        }
        return line.trim_end().to_string();
    }

    if length > width {
        wrap(stripped, width, "", "")
    } else {
        stripped.to_string()
    }
}

/// Short line that reads like a heading.
fn is_title(line: &str) -> bool {
    line.chars().count() < TITLE_MAX_CHARS
        && (is_all_caps(line)
            || line.matches(' ').count() < 5
            || line.matches(':').count() == 1
            || TITLE_PREFIXES.iter().any(|p| line.starts_with(p)))
}

/// Indented line that reads like a credit or label.
fn is_indented_metadata(line: &str) -> bool {
    line.chars().count() < INDENTED_MAX_CHARS
        || line.contains(':')
        || METADATA_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// At least one cased letter and no lowercase ones.
fn is_all_caps(line: &str) -> bool {
    line.chars().any(char::is_uppercase) && !line.chars().any(char::is_lowercase)
}

/// Greedy word wrap; words longer than the width get a line of their own.
fn wrap(text: &str, width: usize, initial_indent: &str, subsequent_indent: &str) -> String {
    let mut lines = Vec::new();
    let mut current = String::from(initial_indent);
    let mut current_len = initial_indent.chars().count();
    let mut has_words = false;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if has_words && current_len + 1 + word_len > width {
            lines.push(std::mem::replace(&mut current, subsequent_indent.to_string()));
            current_len = subsequent_indent.chars().count();
            has_words = false;
        }
        if has_words {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
        has_words = true;
    }

    if has_words {
        lines.push(current);
    }

    lines.join("\n")
}
