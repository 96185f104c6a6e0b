use quire_core::ChunkingError;

/// Offsets count `char`s, not bytes. Offsets past the end clamp to the end and a
/// descending offset is an error.
pub fn split_at_offsets(text: &str, offsets: &[usize]) -> Result<Vec<String>, ChunkingError> {
    let byte_at = char_boundaries(text);
    let char_len = byte_at.len() - 1;

    let mut segments = Vec::new();
    let mut cursor = 0usize;

    for (index, &offset) in offsets.iter().enumerate() {
        if index > 0 && offset < offsets[index - 1] {
            return Err(ChunkingError::MalformedOffsets {
                index,
                offset,
                previous: offsets[index - 1],
            });
        }

        let end = offset.min(char_len);
        if cursor < char_len {
            push_trimmed(&mut segments, &text[byte_at[cursor]..byte_at[end]]);
        }
        cursor = end;
    }

    if cursor < char_len {
        push_trimmed(&mut segments, &text[byte_at[cursor]..]);
    }

    Ok(segments)
}

fn char_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = text.char_indices().map(|(idx, _)| idx).collect::<Vec<_>>();
    boundaries.push(text.len());
    boundaries
}

fn push_trimmed(segments: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}
