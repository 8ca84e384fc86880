use serde::{Deserialize, Serialize};

use crate::services::backends::SESSION_BACKEND;

/// Default bound on `(t_run - t_raw) / t_raw`.
pub const DEFAULT_OVERHEAD_RATIO_LIMIT: f64 = 15.0;

/// Serializable settings for a sandblox workspace.
///
/// This lives at `.blox/config.json` under the chosen root. Every field has a
/// default, so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloxConfig {
    /// Config format version.
    pub config_version: String,
    /// Backend type blocks accept on attach.
    pub backend_type: String,
    /// Upper bound for the run-overhead ratio.
    pub overhead_ratio_limit: f64,
    /// Iterations used when measuring run overhead.
    pub overhead_iterations: usize,
    /// Optional RNG seed for sessions; random per session when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for BloxConfig {
    fn default() -> Self {
        Self {
            config_version: "0.1.0".to_string(),
            backend_type: SESSION_BACKEND.to_string(),
            overhead_ratio_limit: DEFAULT_OVERHEAD_RATIO_LIMIT,
            overhead_iterations: 1000,
            seed: None,
            log_filter: "warn".to_string(),
        }
    }
}

impl BloxConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
