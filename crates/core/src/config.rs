use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChunkingError;

pub const DEFAULT_MIN_TOKENS: usize = 300;
pub const DEFAULT_MAX_TOKENS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    min_tokens: usize,
    max_tokens: usize,
}

impl TokenBudget {
    pub fn new(min_tokens: usize, max_tokens: usize) -> Result<Self, ChunkingError> {
        if min_tokens == 0 || min_tokens > max_tokens {
            return Err(ChunkingError::InvalidBudget {
                min: min_tokens,
                max: max_tokens,
            });
        }

        Ok(Self {
            min_tokens,
            max_tokens,
        })
    }

    pub fn min_tokens(&self) -> usize {
        self.min_tokens
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn window_words(&self) -> usize {
        ((self.min_tokens + self.max_tokens) / 2).max(1)
    }

    pub fn range_label(&self) -> String {
        format!("{}-{}", self.min_tokens, self.max_tokens)
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            min_tokens: DEFAULT_MIN_TOKENS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub budget: TokenBudget,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub openai: Option<OpenAiSettings>,
    pub suggest_timeout: Duration,
    pub embed_dims: usize,
    pub top_k: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ChunkingError> {
        dotenvy::dotenv().ok();

        let budget = TokenBudget::new(
            env_parse("QUIRE_MIN_TOKENS", DEFAULT_MIN_TOKENS),
            env_parse("QUIRE_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        )?;

        let openai = env_opt("QUIRE_OPENAI_API_KEY").map(|api_key| OpenAiSettings {
            api_key,
            model: env_or("QUIRE_OPENAI_MODEL", "gpt-4.1-mini"),
        });

        Ok(Self {
            budget,
            data_dir: PathBuf::from(env_or("QUIRE_DATA_DIR", "data")),
            database_url: env_opt("QUIRE_DATABASE_URL"),
            openai,
            suggest_timeout: Duration::from_secs(env_parse("QUIRE_SUGGEST_TIMEOUT_SECS", 60)),
            embed_dims: env_parse("QUIRE_EMBED_DIMS", 384),
            top_k: env_parse("QUIRE_TOP_K", 5),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            budget: TokenBudget::default(),
            data_dir: PathBuf::from("data"),
            database_url: None,
            openai: None,
            suggest_timeout: Duration::from_secs(60),
            embed_dims: 384,
            top_k: 5,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
