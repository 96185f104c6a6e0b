use anyhow::{Context, Result};
use async_trait::async_trait;
use quire_core::{BoundarySuggestion, TokenBudget};

#[async_trait]
pub trait BoundarySuggester: Send + Sync {
    fn name(&self) -> &'static str;

    async fn suggest(&self, text: &str, budget: TokenBudget) -> Result<BoundarySuggestion>;
}

pub fn build_analysis_prompt(text: &str, budget: TokenBudget) -> String {
    format!(
        "Analyze the following text and provide chunking guidance.\n\n\
         Requirements:\n\
         - Each chunk should be {min}-{max} tokens\n\
         - Identify natural semantic boundaries (topics, concepts, sections)\n\
         - Keep related concepts together and each chunk coherent on its own\n\
         - Character positions count Unicode characters from the start of the text\n\n\
         Text to analyze:\n{text}\n\n\
         Respond with a JSON object containing:\n\
         1. \"suggested_splits\": list of character positions where to split\n\
         2. \"topics\": list of the main topic of each chunk, in order\n\
         3. \"reasoning\": one short explanation per split\n\n\
         Respond with valid JSON only.",
        min = budget.min_tokens(),
        max = budget.max_tokens(),
    )
}

pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + "```json".len()..];
        return body.find("```").map_or(body, |end| &body[..end]).trim();
    }

    if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        return body.rfind("```").map_or(body, |end| &body[..end]).trim();
    }

    trimmed
}

pub fn parse_suggestion(raw: &str) -> Result<BoundarySuggestion> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).with_context(|| {
        format!(
            "boundary suggestion is not valid JSON: {}",
            quire_core::snippet(body, 120)
        )
    })
}
