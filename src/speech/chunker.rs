use crate::normalizer::html::collapse_whitespace;

const TERMINATORS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];

/// Split `text` into chunks of at most `max_chars` characters.
///
/// A chunk ends after the last sentence terminator within the limit when that
/// terminator sits in the back half of the window, otherwise at the last
/// whitespace, otherwise exactly at the limit. Once `max_chunks - 1` chunks
/// exist the remainder becomes one final chunk regardless of its length.
pub fn chunk_text(text: &str, max_chars: usize, max_chunks: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let max_chunks = max_chunks.max(1);
    let chars: Vec<char> = collapse_whitespace(text).chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= max_chars || chunks.len() + 1 == max_chunks {
            push_trimmed(&mut chunks, &chars[start..]);
            break;
        }

        let cut = break_point(&chars[start..], max_chars);
        push_trimmed(&mut chunks, &chars[start..start + cut]);
        start += cut;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }

    chunks
}

/// Length of the next chunk. `rest` is longer than `max`.
fn break_point(rest: &[char], max: usize) -> usize {
    let window = &rest[..max];

    if let Some(pos) = window.iter().rposition(|c| TERMINATORS.contains(c)) {
        if pos + 1 >= max / 2 {
            return pos + 1;
        }
    }

    // The character just past the window may itself be the boundary
    if let Some(pos) = rest[..=max].iter().rposition(|c| c.is_whitespace()) {
        if pos > 0 {
            return pos;
        }
    }

    max
}

fn push_trimmed(chunks: &mut Vec<String>, chars: &[char]) {
    let chunk: String = chars.iter().collect();
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}
