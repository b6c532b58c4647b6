//! Static registry of answer-generation backends.
//!
//! The [`ModelCatalog`] holds one [`ModelDescriptor`] per backend, ordered
//! by failover priority (ascending = tried first). It is built once at
//! startup, validated, and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, RouterError};

/// Where a backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process or on-host inference; no network, no credentials.
    Local,
    /// Hosted API; requires credentials.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// Descriptor for a single backend in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique backend id (also the remote model id sent to the API).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Typical response latency, in seconds.
    pub estimated_latency_s: f64,
    /// Cost per token in USD.
    pub cost_per_token: f64,
    /// Maximum context window in tokens.
    pub max_context: usize,
    pub kind: BackendKind,
    /// Failover priority; lower values are tried first.
    pub priority: u32,
}

impl ModelDescriptor {
    /// Create a local descriptor with zero cost.
    pub fn local(id: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            estimated_latency_s: 0.5,
            cost_per_token: 0.0,
            max_context: 1024,
            kind: BackendKind::Local,
            priority,
        }
    }

    /// Create a remote descriptor.
    pub fn remote(
        id: impl Into<String>,
        name: impl Into<String>,
        cost_per_token: f64,
        max_context: usize,
        priority: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            estimated_latency_s: 1.0,
            cost_per_token,
            max_context,
            kind: BackendKind::Remote,
            priority,
        }
    }

    /// Set the estimated latency.
    pub fn estimated_latency(mut self, latency: Duration) -> Self {
        self.estimated_latency_s = latency.as_secs_f64();
        self
    }

    /// Set the max context window.
    pub fn max_context(mut self, tokens: usize) -> Self {
        self.max_context = tokens;
        self
    }

    pub fn is_local(&self) -> bool {
        self.kind == BackendKind::Local
    }

    pub fn is_remote(&self) -> bool {
        self.kind == BackendKind::Remote
    }
}

/// Immutable, priority-ordered set of backend descriptors.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    /// Sorted by ascending priority.
    models: Vec<ModelDescriptor>,
    /// Index of the lowest-cost local descriptor.
    cheapest_local: usize,
}

impl ModelCatalog {
    /// Build a catalog from descriptors.
    ///
    /// Fails if the list is empty, if ids or priorities repeat, or if there
    /// is no local descriptor (the selector needs one to fall back to when
    /// remote credentials are missing).
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self> {
        if models.is_empty() {
            return Err(RouterError::Configuration(
                "model catalog is empty".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut priorities = HashSet::new();
        for model in &models {
            if !ids.insert(model.id.as_str()) {
                return Err(RouterError::Configuration(format!(
                    "duplicate backend id in catalog: {}",
                    model.id
                )));
            }
            if !priorities.insert(model.priority) {
                return Err(RouterError::Configuration(format!(
                    "duplicate failover priority {} (backend {})",
                    model.priority, model.id
                )));
            }
        }

        if !models.iter().any(ModelDescriptor::is_local) {
            return Err(RouterError::Configuration(
                "model catalog has no local backend".to_string(),
            ));
        }

        Ok(Self::from_validated(models))
    }

    fn from_validated(mut models: Vec<ModelDescriptor>) -> Self {
        models.sort_by_key(|m| m.priority);
        // min_by keeps the first of equal elements, so cost ties go to
        // the higher priority
        let cheapest_local = models
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_local())
            .min_by(|(_, a), (_, b)| a.cost_per_token.total_cmp(&b.cost_per_token))
            .map_or(0, |(idx, _)| idx);
        Self {
            models,
            cheapest_local,
        }
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// All descriptors in ascending failover priority.
    pub fn by_priority(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    /// Descriptors eligible for candidacy.
    ///
    /// Remote descriptors are excluded when no credentials are configured;
    /// this is an exclusion, not a failure.
    pub fn available(&self, credentials_available: bool) -> impl Iterator<Item = &ModelDescriptor> {
        self.models
            .iter()
            .filter(move |m| m.is_local() || credentials_available)
    }

    /// The lowest-cost local descriptor (ties go to the higher priority).
    pub fn cheapest_local(&self) -> &ModelDescriptor {
        &self.models[self.cheapest_local]
    }

    /// Local descriptors in priority order.
    pub fn local_candidates(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().filter(|m| m.is_local())
    }

    /// Remote descriptors in priority order.
    pub fn remote_candidates(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().filter(|m| m.is_remote())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    /// The stock three-tier catalog: a free fine-tuned local model, a cheap
    /// mid-tier remote model, and a large-context remote model.
    fn default() -> Self {
        Self::from_validated(default_models())
    }
}

/// Descriptors for the default catalog, in priority order.
pub fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::local("local_gpt2", "Local GPT-2 Fine-tuned", 1)
            .estimated_latency(Duration::from_millis(500))
            .max_context(1024),
        ModelDescriptor::remote("gpt-3.5-turbo", "GPT-3.5 Turbo", 0.002 / 1000.0, 4096, 2)
            .estimated_latency(Duration::from_secs(1)),
        ModelDescriptor::remote("gpt-4", "GPT-4", 0.03 / 1000.0, 8192, 3)
            .estimated_latency(Duration::from_secs(2)),
    ]
}
