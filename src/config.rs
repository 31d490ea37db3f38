//! Configuration Management
//!
//! Layered configuration for the evidence pipeline: built-in defaults,
//! optionally overridden by a TOML file, then by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which `AiProvider` implementation the pipeline should construct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AiBackend {
    /// Real HTTP-backed provider against an OpenAI-compatible endpoint.
    OpenAi,
    /// Deterministic in-memory fake, used in tests and when no API key is configured.
    Mock,
}

/// Retry/backoff policy applied around any `AiProvider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the given attempt (0-based; attempt 0 never sleeps).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        let delay_ms =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the evidence store (`raw/`, `derived/`, `cases/`).
    pub store_root: PathBuf,
    /// Which AI backend to construct.
    pub ai_backend: AiBackend,
    /// Base URL for the OpenAI-compatible endpoint.
    pub ai_base_url: String,
    /// Model name passed to the AI provider.
    pub ai_model: String,
    /// API key; read from `OPENAI_API_KEY` if unset here. Absence disables
    /// AI-backed stages per the `ConfigMissing` contract.
    pub ai_api_key: Option<String>,
    /// Per-call timeout.
    pub ai_timeout_secs: u64,
    /// Retry/backoff policy for transient AI errors.
    pub retry: RetryConfig,
    /// Global cap on concurrent in-flight AI calls.
    pub ai_concurrency_limit: usize,
    /// Evidence summaries per map-reduce chunk in the summary aggregator.
    pub map_reduce_chunk_size: usize,
    /// Window (hours) used to group events into a temporal sequence.
    pub temporal_sequence_window_hours: i64,
    /// Gap (hours) above which a timeline gap is recorded.
    pub timeline_gap_threshold_hours: i64,
    /// Default actor name recorded in chain-of-custody events when the
    /// caller does not supply one.
    pub default_actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("./evidence-store"),
            ai_backend: AiBackend::Mock,
            ai_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-4o".to_string(),
            ai_api_key: None,
            ai_timeout_secs: 120,
            retry: RetryConfig::default(),
            ai_concurrency_limit: 5,
            map_reduce_chunk_size: 30,
            temporal_sequence_window_hours: 72,
            timeline_gap_threshold_hours: 168,
            default_actor: "system".to_string(),
        }
    }
}

impl Config {
    /// Loads defaults, then an optional TOML file, then environment
    /// overrides (`EVIDENCE_TOOLKIT_*` plus the literal `OPENAI_API_KEY`).
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
            config = toml_merge(config, &text)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("EVIDENCE_TOOLKIT_STORE_ROOT") {
            self.store_root = PathBuf::from(root);
        }
        if let Ok(model) = std::env::var("EVIDENCE_TOOLKIT_AI_MODEL") {
            self.ai_model = model;
        }
        if let Ok(base_url) = std::env::var("EVIDENCE_TOOLKIT_AI_BASE_URL") {
            self.ai_base_url = base_url;
        }
        if let Ok(limit) = std::env::var("EVIDENCE_TOOLKIT_AI_CONCURRENCY") {
            if let Ok(n) = limit.parse() {
                self.ai_concurrency_limit = n;
            }
        }
        // The literal environment variable named by the external contract:
        // its absence disables AI-dependent stages.
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.ai_api_key = Some(key);
            if self.ai_backend == AiBackend::Mock {
                self.ai_backend = AiBackend::OpenAi;
            }
        }
    }

    /// Whether the AI backend is actually usable (non-mock with a key, or
    /// mock which never needs one).
    pub fn ai_configured(&self) -> bool {
        match self.ai_backend {
            AiBackend::Mock => true,
            AiBackend::OpenAi => self.ai_api_key.is_some(),
        }
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

/// Minimal TOML-over-defaults merge: parses the file as a loose
/// `serde_json::Value`-style table and overwrites only the keys present,
/// overwriting only the keys present in the file.
fn toml_merge(mut base: Config, text: &str) -> anyhow::Result<Config> {
    let parsed: PartialConfig = toml::from_str(text)?;
    if let Some(v) = parsed.store_root {
        base.store_root = PathBuf::from(v);
    }
    if let Some(v) = parsed.ai_backend {
        base.ai_backend = match v.as_str() {
            "openai" => AiBackend::OpenAi,
            _ => AiBackend::Mock,
        };
    }
    if let Some(v) = parsed.ai_base_url {
        base.ai_base_url = v;
    }
    if let Some(v) = parsed.ai_model {
        base.ai_model = v;
    }
    if let Some(v) = parsed.ai_timeout_secs {
        base.ai_timeout_secs = v;
    }
    if let Some(v) = parsed.ai_concurrency_limit {
        base.ai_concurrency_limit = v;
    }
    if let Some(v) = parsed.map_reduce_chunk_size {
        base.map_reduce_chunk_size = v;
    }
    Ok(base)
}

#[derive(Default, Deserialize)]
struct PartialConfig {
    store_root: Option<String>,
    ai_backend: Option<String>,
    ai_base_url: Option<String>,
    ai_model: Option<String>,
    ai_timeout_secs: Option<u64>,
    ai_concurrency_limit: Option<usize>,
    map_reduce_chunk_size: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_mock_backend() {
        let config = Config::default();
        assert_eq!(config.ai_backend, AiBackend::Mock);
        assert!(config.ai_configured());
    }

    #[test]
    fn retry_delay_grows_exponentially() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(1000));
    }

    #[test]
    fn retry_delay_caps_at_max() {
        let retry = RetryConfig { max_delay_ms: 400, ..RetryConfig::default() };
        assert_eq!(retry.delay_for_attempt(5), Duration::from_millis(400));
    }

    #[test]
    fn toml_merge_overrides_only_present_keys() {
        let base = Config::default();
        let merged = toml_merge(base.clone(), "ai_model = \"gpt-4o-mini\"\n").unwrap();
        assert_eq!(merged.ai_model, "gpt-4o-mini");
        assert_eq!(merged.store_root, base.store_root);
    }
}
