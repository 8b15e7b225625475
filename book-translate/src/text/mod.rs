//! Text processing: source clean-up, segmentation, repetition trimming and
//! output formatting.

mod cleaner;
pub mod formatter;
pub mod repetition;
pub mod segmenter;

pub use cleaner::{normalize_source, strip_gutenberg};
pub use formatter::format_book_output;
pub use repetition::clean_repetition;
pub use segmenter::segment;

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// An ordered unit of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position in the document
    pub index: u32,
    /// The chunk content
    pub text: String,
}

impl Chunk {
    pub fn new(index: u32, text: String) -> Self {
        Self { index, text }
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_counts_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        // Multi-byte characters count once each
        assert_eq!(estimate_tokens("ñññññññññ"), 2);
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(3, "Hello world, hello".to_string());
        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.estimated_tokens(), 4);
    }
}
