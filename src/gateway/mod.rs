//! Router composition

mod builder;
mod router;

pub use builder::RouterBuilder;
pub use router::{DEFAULT_MAX_TOKENS, Router, build_prompt};
