use std::path::Path;

use crate::error::ChunkingError;
use crate::models::{Document, PageText};

pub const PAGE_SEPARATOR: &str = "\n\n";

pub fn document_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(filename)
        .to_string()
}

pub fn page_sort_key(file_name: &str) -> u64 {
    let digits = file_name
        .chars()
        .filter(|ch| ch.is_ascii_digit())
        .collect::<String>();
    digits.parse().unwrap_or(0)
}

pub fn combine_pages(pages: &[PageText]) -> String {
    let mut combined = String::new();
    for page in pages {
        let content = page.text.trim();
        if content.is_empty() {
            continue;
        }
        combined.push_str(content);
        combined.push_str(PAGE_SEPARATOR);
    }
    combined
}

impl Document {
    pub fn combined_text(&self) -> Result<String, ChunkingError> {
        if self.pages.is_empty() {
            return Err(ChunkingError::EmptyDocument(self.filename.clone()));
        }

        let combined = combine_pages(&self.pages);
        if combined.trim().is_empty() {
            return Err(ChunkingError::EmptyDocument(self.filename.clone()));
        }

        Ok(combined)
    }
}
