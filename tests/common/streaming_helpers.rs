//! Streaming Test Helpers
//!
//! Chunkings that simulate how model tokens arrive. Marker tokens known to
//! the mock tokenizer are always kept whole, as a real tokenizer would.

const MARKERS: &[&str] = &[
    "<tool_call>",
    "</tool_call>",
    "[TOOL_CALLS]",
    "<|python_tag|>",
    "<|eot_id|>",
];

fn marker_at(rest: &str) -> Option<&'static str> {
    MARKERS.iter().copied().find(|marker| rest.starts_with(marker))
}

/// Split into chunks of at most `size` characters, markers as their own chunk
pub fn chunks_of(input: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        if let Some(marker) = marker_at(rest) {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                count = 0;
            }
            chunks.push(marker.to_string());
            rest = &rest[marker.len()..];
            continue;
        }

        current.push(ch);
        count += 1;
        rest = &rest[ch.len_utf8()..];
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// One character per chunk
pub fn char_chunks(input: &str) -> Vec<String> {
    chunks_of(input, 1)
}

/// Break after JSON punctuation, the positions most likely to expose
/// half-parsed state
pub fn strategic_chunks(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        if let Some(marker) = marker_at(rest) {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(marker.to_string());
            rest = &rest[marker.len()..];
            continue;
        }

        current.push(ch);
        rest = &rest[ch.len_utf8()..];
        if matches!(ch, '"' | ':' | ',' | '{' | '}' | '[' | ']') || current.len() >= 5 {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

