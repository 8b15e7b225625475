//! Trimming of runaway repetition at the end of model output.

/// Shortest block that counts as a repetition.
pub const MIN_REPEAT_CHARS: usize = 200;

/// Drop contiguous duplicate copies of a trailing block.
///
/// Looks for a block of at least [`MIN_REPEAT_CHARS`] characters that repeats
/// back-to-back up to the very end of the text and keeps only the first copy.
/// The leftmost, longest such block wins. The result is always trimmed.
pub fn clean_repetition(text: &str) -> String {
    let trimmed_end = text.trim_end();
    let candidates: &[&str] = if trimmed_end.len() == text.len() {
        &[text]
    } else {
        &[text, trimmed_end]
    };

    for candidate in candidates {
        let chars: Vec<char> = candidate.chars().collect();
        if let Some(cut) = find_repeated_tail(&chars, MIN_REPEAT_CHARS) {
            let kept: String = chars[..cut].iter().collect();
            log::debug!(
                "Trimmed {} repeated characters from translation output",
                chars.len() - cut
            );
            return kept.trim().to_string();
        }
    }

    text.trim().to_string()
}

/// Char offset where the first redundant copy begins.
fn find_repeated_tail(chars: &[char], min_len: usize) -> Option<usize> {
    let n = chars.len();
    if min_len == 0 || n < 2 * min_len {
        return None;
    }

    for start in 0..=(n - 2 * min_len) {
        let span = n - start;
        // Fewest copies first means longest block first
        for copies in 2..=(span / min_len) {
            if span % copies != 0 {
                continue;
            }
            let block_len = span / copies;
            if has_period(&chars[start..], block_len) {
                return Some(start + block_len);
            }
        }
    }

    None
}

fn has_period(s: &[char], period: usize) -> bool {
    s[period..].iter().zip(s).all(|(a, b)| a == b)
}
