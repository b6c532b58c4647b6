//! HuggingFace `tokenizer.json` support for local models.

use std::path::Path;

use super::TokenizerProvider;
use crate::error::{Result, RouterError};

/// Tokenizer loaded from a HuggingFace `tokenizer.json`.
///
/// Typically pointed at the fine-tuned local model's directory so the
/// estimate matches what the local backend will actually see.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load `tokenizer.json` from a HuggingFace Hub repository.
    pub fn from_hub(repo_id: &str) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| RouterError::Tokenizer(format!("HF hub unavailable: {e}")))?;
        let path = api
            .model(repo_id.to_string())
            .get("tokenizer.json")
            .map_err(|e| RouterError::Tokenizer(format!("{repo_id}: {e}")))?;
        Self::from_file(&path)
    }

    /// Load from a model directory containing `tokenizer.json`.
    pub fn from_model_dir(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join("tokenizer.json"))
    }

    /// Load from a `tokenizer.json` path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| RouterError::Tokenizer(format!("{}: {e}", path.display())))?;
        Ok(Self { inner })
    }

    fn encode(&self, text: &str) -> Result<tokenizers::Encoding> {
        self.inner
            .encode(text, false)
            .map_err(|e| RouterError::Tokenizer(e.to_string()))
    }
}

impl TokenizerProvider for HfTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}
