//! Pipeline configuration
//!
//! Controls threading, channel sizes and failure handling for the naming
//! pipeline. Reads from Settings (.symdex/settings.toml).

use serde::{Deserialize, Serialize};

use crate::Settings;

/// What to do when one file fails to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the file and keep going.
    #[default]
    Continue,
    /// Stop merging at the first failed file (in input order).
    Abort,
}

/// Configuration for the parallel naming pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of naming threads (default: CPU count - 1)
    pub threads: usize,

    /// Channel capacity between the naming threads and the merger
    pub channel_size: usize,

    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let threads = num_cpus::get().saturating_sub(1).max(1);
        Self {
            threads,
            channel_size: threads * 16,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from Settings.
    ///
    /// - `indexing.threads` -> threads
    /// - `indexing.failure_policy` -> failure_policy
    pub fn from_settings(settings: &Settings) -> Self {
        let threads = settings.indexing.threads.max(1);
        Self {
            threads,
            channel_size: threads * 16,
            failure_policy: settings.indexing.failure_policy,
        }
    }

    /// Set thread count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self.channel_size = self.threads * 16;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
