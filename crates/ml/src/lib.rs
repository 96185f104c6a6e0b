mod hashing;

use std::sync::Arc;

use quire_core::Settings;
use quire_retrieval::EmbeddingModel;
use tracing::info;

pub use hashing::HashEmbeddingModel;

#[derive(Clone)]
pub struct EmbeddingStack {
    pub embedder: Arc<dyn EmbeddingModel>,
    pub dims: usize,
}

impl EmbeddingStack {
    pub fn load_default(settings: &Settings) -> Self {
        let model = HashEmbeddingModel::new(settings.embed_dims);
        let dims = model.dims();
        info!(model = model.model_name(), dims, "embedding model ready");

        Self {
            embedder: Arc::new(model),
            dims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stack_uses_configured_dims() {
        let settings = Settings {
            embed_dims: 64,
            ..Settings::default()
        };
        let stack = EmbeddingStack::load_default(&settings);
        assert_eq!(stack.dims, 64);
        assert_eq!(stack.embedder.embed("hello world").len(), 64);
    }
}
