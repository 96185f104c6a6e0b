use quire_core::{BoundarySuggestion, TokenBudget};

pub const FALLBACK_TOPIC: &str = "Content section";
pub const FALLBACK_REASONING: &str = "Fallback automatic splitting";

fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_word = false;

    for (char_idx, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            in_word = false;
        } else if !in_word {
            starts.push(char_idx);
            in_word = true;
        }
    }

    starts
}

pub fn word_window_suggestion(text: &str, budget: TokenBudget) -> BoundarySuggestion {
    let window = budget.window_words();
    let suggested_splits = word_starts(text)
        .into_iter()
        .step_by(window)
        .skip(1)
        .collect();

    BoundarySuggestion {
        suggested_splits,
        topics: vec![FALLBACK_TOPIC.to_string()],
        reasoning: vec![FALLBACK_REASONING.to_string()],
    }
}
