//! Tiktoken BPE tokenizer for OpenAI chat models.

use tiktoken_rs::{CoreBPE, cl100k_base};

use super::TokenizerProvider;
use crate::error::{Result, RouterError};

/// Tiktoken tokenizer wrapper (cl100k_base covers gpt-3.5-turbo and gpt-4).
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load the cl100k_base encoding.
    pub fn cl100k() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| RouterError::Tokenizer(format!("failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenizerProvider for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_short_question() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        let count = tokenizer.count_tokens("What is PTO?").unwrap();
        assert!(count > 0 && count < 10);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.count_tokens("").unwrap(), 0);
    }
}
