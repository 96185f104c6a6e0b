pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod text;

pub use config::{OpenAiSettings, Settings, TokenBudget, DEFAULT_MAX_TOKENS, DEFAULT_MIN_TOKENS};
pub use document::{combine_pages, document_name, page_sort_key, PAGE_SEPARATOR};
pub use error::ChunkingError;
pub use models::*;
pub use text::{normalize_text, snippet, squash_whitespace};
