use once_cell::sync::Lazy;
use regex::Regex;

static CLEANER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{Nd}\s]+").expect("valid tokenizer regex"));

pub fn tokenize(input: &str) -> Vec<String> {
    let normalized = CLEANER.replace_all(input, " ").to_lowercase();

    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_short_tokens() {
        let tokens = tokenize("What's the late-fee (EUR) policy? A: 5%");
        assert_eq!(tokens, vec!["what", "the", "late", "fee", "eur", "policy"]);
    }

    #[test]
    fn keeps_non_latin_scripts() {
        let tokens = tokenize("מים אפורים + grey water");
        assert!(tokens.iter().any(|t| t == "מים"));
        assert!(tokens.iter().any(|t| t == "grey"));
    }
}
