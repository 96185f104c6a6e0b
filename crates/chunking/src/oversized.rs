use crate::tokenizer::Tokenizer;

pub const SENTENCE_DELIMITER: &str = ". ";

// Splits after every literal ". ", abbreviations included.
pub fn sentence_units(text: &str) -> Vec<&str> {
    text.split_inclusive(SENTENCE_DELIMITER)
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .collect()
}

/// A single sentence that alone exceeds `max_tokens` is emitted as-is.
pub fn split_oversized(text: &str, max_tokens: usize, tokenizer: &dyn Tokenizer) -> Vec<String> {
    let mut sub_chunks = Vec::new();
    let mut buffer = String::new();

    for unit in sentence_units(text) {
        if buffer.is_empty() {
            buffer.push_str(unit);
            continue;
        }

        let candidate = format!("{buffer} {unit}");
        if tokenizer.count_tokens(&candidate) <= max_tokens {
            buffer = candidate;
        } else {
            sub_chunks.push(std::mem::take(&mut buffer));
            buffer.push_str(unit);
        }
    }

    if !buffer.is_empty() {
        sub_chunks.push(buffer);
    }

    sub_chunks
}
