//! Engine configuration.

use crate::network::{ALPHA_MEMORY_HASH_SIZE, INITIAL_BETA_HASH_SIZE};
use crate::trace::TracerConfig;

/// Configuration for one [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Prime newly added rules from live working memory instead of
    /// waiting for the next reset.
    pub incremental_reset: bool,

    /// Allow asserting a fact identical to a live one.
    pub fact_duplication: bool,

    /// Bucket count of hashed beta memories when created or emptied.
    pub initial_beta_hash_size: usize,

    /// Bucket count of the shared alpha memory table.
    pub alpha_hash_size: usize,

    /// Watch facility settings.
    pub trace: TracerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            incremental_reset: true,
            fact_duplication: false,
            initial_beta_hash_size: INITIAL_BETA_HASH_SIZE,
            alpha_hash_size: ALPHA_MEMORY_HASH_SIZE,
            trace: TracerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that records every watch event.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            trace: TracerConfig::all(),
            ..Self::default()
        }
    }

    /// Builder method to toggle incremental reset.
    #[must_use]
    pub fn with_incremental_reset(mut self, enabled: bool) -> Self {
        self.incremental_reset = enabled;
        self
    }

    /// Builder method to toggle fact duplication.
    #[must_use]
    pub fn with_fact_duplication(mut self, enabled: bool) -> Self {
        self.fact_duplication = enabled;
        self
    }

    /// Builder method to set the initial beta hash size.
    #[must_use]
    pub fn with_initial_beta_hash_size(mut self, size: usize) -> Self {
        self.initial_beta_hash_size = size.max(1);
        self
    }

    /// Builder method to set the alpha hash size.
    #[must_use]
    pub fn with_alpha_hash_size(mut self, size: usize) -> Self {
        self.alpha_hash_size = size.max(1);
        self
    }

    /// Builder method to set tracer settings.
    #[must_use]
    pub fn with_trace(mut self, trace: TracerConfig) -> Self {
        self.trace = trace;
        self
    }
}
