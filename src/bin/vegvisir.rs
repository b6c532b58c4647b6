//! vegvisir — question-answering router CLI
//!
//! Routes a question through the configured backends and prints the result
//! as JSON.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use vegvisir::routing::ModelSelector;
use vegvisir::{
    Config, DEFAULT_MAX_TOKENS, InMemoryMetrics, MetricsSink, Secrets, TokenBudgetEstimator,
};

/// Vegvisir CLI
#[derive(Parser)]
#[command(name = "vegvisir")]
#[command(version = vegvisir::PKG_VERSION)]
#[command(about = "Failover model router for question answering")]
struct Args {
    /// Config file (default: ~/.vegvisir/config.toml, then /etc/vegvisir/config.toml, then
    /// built-in defaults)
    #[arg(short, long, env = "VEGVISIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question
    Ask {
        /// Question (or omit to read from stdin)
        question: Option<String>,
        /// File with retrieved context to ground the answer on
        #[arg(long)]
        context_file: Option<PathBuf>,
        /// Generation budget in tokens
        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
        /// Accumulate dashboard metrics in this JSON file
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Show which backend a question would be routed to
    Select {
        /// Question (or omit to read from stdin)
        question: Option<String>,
        /// Estimated tokens of accompanying context
        #[arg(long, default_value_t = 0)]
        context_length: usize,
    },

    /// List the model catalog in failover order
    Models,

    /// Summarise a metrics file written by `ask --metrics`
    Stats {
        /// Metrics JSON file
        metrics: PathBuf,
        /// Number of top questions to show
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[derive(Serialize)]
struct Selection<'a> {
    backend_id: &'a str,
    question_tokens: usize,
    context_length: usize,
    credentials_available: bool,
}

#[derive(Serialize)]
struct Stats {
    total_queries: u64,
    cache_hit_rate: f64,
    p95_latency_s: f64,
    total_cost_usd: f64,
    top_questions: Vec<(String, u64)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    // Commands that don't need a config file
    if let Command::Stats { metrics, top } = &args.command {
        let snapshot = InMemoryMetrics::load(metrics)?.snapshot();
        print_json(&Stats {
            total_queries: snapshot.total_queries,
            cache_hit_rate: snapshot.cache_hit_rate(),
            p95_latency_s: snapshot.p95_latency(),
            total_cost_usd: snapshot.total_cost(),
            top_questions: snapshot.top_questions(*top),
        })?;
        return Ok(());
    }

    let config = Config::load_or_default(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    match args.command {
        Command::Ask {
            question,
            context_file,
            max_tokens,
            metrics,
        } => {
            let question = resolve_text(question, "ask")?;
            let context = match context_file {
                Some(path) => std::fs::read_to_string(path)?,
                None => String::new(),
            };

            let sink = match &metrics {
                Some(path) => Some(Arc::new(InMemoryMetrics::load(path)?)),
                None => None,
            };

            let mut builder = config.router_builder(&secrets)?;
            if let Some(sink) = &sink {
                builder = builder.metrics(Arc::clone(sink) as Arc<dyn MetricsSink>);
            }
            let router = builder.build()?;

            let result = router.generate(&question, context.trim(), max_tokens).await;

            if let (Some(sink), Some(path)) = (&sink, &metrics) {
                sink.save(path)?;
            }
            print_json(&result)?;
        }
        Command::Select {
            question,
            context_length,
        } => {
            let question = resolve_text(question, "select")?;
            let catalog = Arc::new(config.catalog()?);
            let selector = ModelSelector::new(
                catalog,
                Arc::new(TokenBudgetEstimator::with_defaults()),
                config.selector,
            );
            let credentials_available = secrets.openai_api_key().is_some();
            print_json(&Selection {
                backend_id: selector.select(&question, context_length, credentials_available),
                question_tokens: selector.estimate(&question),
                context_length,
                credentials_available,
            })?;
        }
        Command::Models => {
            let catalog = config.catalog()?;
            print_json(&catalog.by_priority().collect::<Vec<_>>())?;
        }
        Command::Stats { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
