//! Primary backend selection.

pub mod selector;

pub use selector::{ModelSelector, SelectorConfig};
