use quire_core::{ChunkingError, TokenBudget};
use serde::Serialize;
use tracing::debug;

use crate::oversized::split_oversized;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairStats {
    pub segments_in: usize,
    pub merged: usize,
    pub split: usize,
    pub undersized_kept: usize,
    pub oversized_kept: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub chunks: Vec<String>,
    pub stats: RepairStats,
}

// Undersized segments merge into the previous entry only while the merge fits
// `max_tokens`. Split pieces of oversized segments are never re-merged.
pub fn validate_and_repair(
    segments: Vec<String>,
    budget: TokenBudget,
    tokenizer: &dyn Tokenizer,
) -> Result<RepairOutcome, ChunkingError> {
    let mut stats = RepairStats {
        segments_in: segments.len(),
        ..RepairStats::default()
    };
    let mut output: Vec<String> = Vec::new();

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let tokens = tokenizer.count_tokens(segment);

        if tokens < budget.min_tokens() {
            let merged = output
                .last()
                .map(|previous| format!("{previous} {segment}"))
                .filter(|merged| tokenizer.count_tokens(merged) <= budget.max_tokens());

            match merged {
                Some(merged) => {
                    debug!(tokens, "merged undersized segment into previous chunk");
                    if let Some(previous) = output.last_mut() {
                        *previous = merged;
                    }
                    stats.merged += 1;
                }
                None => {
                    stats.undersized_kept += 1;
                    output.push(segment.to_string());
                }
            }
        } else if tokens > budget.max_tokens() {
            let pieces = split_oversized(segment, budget.max_tokens(), tokenizer);
            debug!(tokens, pieces = pieces.len(), "split oversized segment");
            stats.split += 1;
            stats.oversized_kept += pieces
                .iter()
                .filter(|piece| tokenizer.count_tokens(piece) > budget.max_tokens())
                .count();
            output.extend(pieces);
        } else {
            output.push(segment.to_string());
        }
    }

    if output.is_empty() {
        return Err(ChunkingError::NoSegments);
    }

    Ok(RepairOutcome {
        chunks: output,
        stats,
    })
}
