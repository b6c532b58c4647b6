//! Local inference backend.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::{Backend, Generation};
use crate::catalog::ModelDescriptor;
use crate::tokenizer::TokenBudgetEstimator;
use crate::{Result, RouterError};

/// A synchronous, on-host text generator.
///
/// Implementations run to their token budget with no cancellation point;
/// callers that need a hard deadline must wrap the call themselves.
pub trait LocalModel: Send + Sync {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// [`Backend`] for a [`LocalModel`].
///
/// Generation runs on tokio's blocking pool. Cost is always zero.
pub struct LocalBackend {
    descriptor: ModelDescriptor,
    model: Arc<dyn LocalModel>,
    estimator: Arc<TokenBudgetEstimator>,
}

impl LocalBackend {
    pub fn new(
        descriptor: ModelDescriptor,
        model: Arc<dyn LocalModel>,
        estimator: Arc<TokenBudgetEstimator>,
    ) -> Self {
        Self {
            descriptor,
            model,
            estimator,
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        self.estimator.estimate(text, &self.descriptor)
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Generation> {
        let start = Instant::now();
        let model = Arc::clone(&self.model);
        let prompt = prompt.to_owned();

        let text = tokio::task::spawn_blocking(move || model.generate(&prompt, max_tokens))
            .await
            .map_err(|e| RouterError::Local(format!("inference task failed: {e}")))?
            .map_err(|e| match e {
                RouterError::Local(_) => e,
                other => RouterError::Local(other.to_string()),
            })?;

        if text.trim().is_empty() {
            return Err(RouterError::Local("model produced no text".to_string()));
        }

        Ok(Generation {
            text,
            latency: start.elapsed(),
            cost_usd: 0.0,
        })
    }
}

/// [`LocalModel`] that shells out to a local inference executable.
///
/// The prompt is written to the child's stdin and its stdout is the
/// completion. The literal `{max_tokens}` in any argument is replaced with
/// the token budget, e.g. for llama.cpp:
///
/// ```rust,no_run
/// # use vegvisir::backends::CommandModel;
/// let model = CommandModel::new("llama-cli")
///     .args(["-m", "models/qa.gguf", "-n", "{max_tokens}", "-f", "/dev/stdin"]);
/// ```
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl LocalModel for CommandModel {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let budget = max_tokens.to_string();
        let args = self.args.iter().map(|a| a.replace("{max_tokens}", &budget));
        debug!(program = %self.program, max_tokens, "running local model");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RouterError::Local(format!("failed to start {}: {e}", self.program)))?;

        // The prompt is fed from a separate thread so stdout and stderr drain
        // while the child is still reading. A model that exits without
        // draining stdin closes the pipe early; its exit status carries the
        // real error.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => match stdin.write_all(prompt.as_bytes()) {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                },
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (written, output)
        });
        let output = output?;
        written?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RouterError::Local(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl LocalModel for Echo {
        fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
            Ok(format!("{prompt} [{max_tokens}]"))
        }
    }

    struct Silent;
    impl LocalModel for Silent {
        fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            Ok("   ".into())
        }
    }

    struct Crashing;
    impl LocalModel for Crashing {
        fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            Err(RouterError::Io(std::io::Error::other("model file missing")))
        }
    }

    fn backend(model: Arc<dyn LocalModel>) -> LocalBackend {
        LocalBackend::new(
            ModelDescriptor::local("local", "Local", 1),
            model,
            Arc::new(TokenBudgetEstimator::new()),
        )
    }

    #[tokio::test]
    async fn generates_with_zero_cost() {
        let generation = backend(Arc::new(Echo)).generate("hi", 16).await.unwrap();
        assert_eq!(generation.text, "hi [16]");
        assert_eq!(generation.cost_usd, 0.0);
    }

    #[tokio::test]
    async fn blank_output_is_a_failure() {
        let err = backend(Arc::new(Silent)).generate("hi", 16).await.unwrap_err();
        assert!(matches!(err, RouterError::Local(_)));
    }

    #[tokio::test]
    async fn every_failure_becomes_local() {
        let err = backend(Arc::new(Crashing))
            .generate("hi", 16)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Local(msg) if msg.contains("model file missing")));
    }

    #[test]
    fn estimate_uses_heuristic_without_tokenizer() {
        assert_eq!(backend(Arc::new(Echo)).estimate_tokens("What is PTO?"), 4);
    }

    #[cfg(unix)]
    #[test]
    fn command_model_pipes_prompt_through_stdin() {
        let model = CommandModel::new("sh").args(["-c", "printf '%s:' {max_tokens}; cat"]);
        assert_eq!(model.generate("hello", 32).unwrap(), "32:hello");
    }

    #[cfg(unix)]
    #[test]
    fn command_model_reports_exit_status() {
        let model = CommandModel::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let err = model.generate("hello", 32).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn command_model_drains_output_while_writing_large_prompt() {
        // Fills the stderr pipe before reading stdin, as llama.cpp does with
        // its load logs.
        let model = CommandModel::new("sh").args(["-c", "head -c 200000 /dev/zero >&2; cat"]);
        let prompt = "a".repeat(200_000);
        let text = model.generate(&prompt, 32).unwrap();
        assert_eq!(text.len(), 200_000);
    }

    #[test]
    fn command_model_missing_program() {
        let model = CommandModel::new("/nonexistent/vegvisir-model");
        assert!(matches!(
            model.generate("hello", 32),
            Err(RouterError::Local(_))
        ));
    }
}
