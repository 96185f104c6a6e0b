use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use quire_core::{ContextEntry, GroundedAnswer, RetrievedChunk, SourceCitation};
use quire_retrieval::tokenize;
use unicode_segmentation::UnicodeSegmentation;

pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the retrieved context.";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, question: &str, hits: &[RetrievedChunk]) -> Result<GroundedAnswer>;
}

fn source_label(filename: &str, chunk_number: usize) -> String {
    format!("[Source: {filename} | chunk {chunk_number}]")
}

struct GroundingContext {
    sources_used: Vec<SourceCitation>,
    retrieved_context: Vec<ContextEntry>,
}

fn build_context(hits: &[RetrievedChunk]) -> GroundingContext {
    let mut sources_used = Vec::with_capacity(hits.len());
    let mut retrieved_context = Vec::with_capacity(hits.len());

    for hit in hits {
        let label = source_label(&hit.source_filename, hit.chunk_number);
        sources_used.push(SourceCitation {
            display: label.clone(),
            source_filename: hit.source_filename.clone(),
            chunk_number: hit.chunk_number,
            chunk_id: hit.chunk_id.clone(),
            score: hit.score,
        });
        retrieved_context.push(ContextEntry {
            label,
            text: hit.text.clone(),
        });
    }

    GroundingContext {
        sources_used,
        retrieved_context,
    }
}

#[derive(Debug, Clone)]
pub struct ExtractiveAnswerGenerator {
    max_sentences: usize,
}

impl Default for ExtractiveAnswerGenerator {
    fn default() -> Self {
        Self { max_sentences: 3 }
    }
}

impl ExtractiveAnswerGenerator {
    fn compose(&self, question: &str, hits: &[RetrievedChunk]) -> String {
        let query_terms = tokenize(question).into_iter().collect::<HashSet<_>>();

        // (overlap, hit index, sentence index, sentence)
        let mut candidates = Vec::new();
        for (hit_idx, hit) in hits.iter().enumerate() {
            for (sentence_idx, sentence) in hit.text.unicode_sentences().enumerate() {
                let sentence = sentence.trim();
                if sentence.is_empty() {
                    continue;
                }
                let overlap = tokenize(sentence)
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .intersection(&query_terms)
                    .count();
                candidates.push((overlap, hit_idx, sentence_idx, sentence));
            }
        }

        let mut picked = candidates
            .iter()
            .filter(|(overlap, ..)| *overlap > 0)
            .copied()
            .collect::<Vec<_>>();
        picked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        picked.truncate(self.max_sentences);

        if picked.is_empty() {
            picked.extend(candidates.first().copied());
        }
        picked.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        picked
            .into_iter()
            .map(|(_, hit_idx, _, sentence)| {
                let hit = &hits[hit_idx];
                format!("{sentence} {}", source_label(&hit.source_filename, hit.chunk_number))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveAnswerGenerator {
    fn name(&self) -> &'static str {
        "extractive"
    }

    async fn generate(&self, question: &str, hits: &[RetrievedChunk]) -> Result<GroundedAnswer> {
        if hits.is_empty() {
            return Ok(GroundedAnswer {
                question: question.to_string(),
                final_answer: NO_CONTEXT_ANSWER.to_string(),
                sources_used: Vec::new(),
                retrieved_context: Vec::new(),
                generator: self.name().to_string(),
                answered_at: Utc::now(),
            });
        }

        let grounding = build_context(hits);
        Ok(GroundedAnswer {
            question: question.to_string(),
            final_answer: self.compose(question, hits),
            sources_used: grounding.sources_used,
            retrieved_context: grounding.retrieved_context,
            generator: self.name().to_string(),
            answered_at: Utc::now(),
        })
    }
}
