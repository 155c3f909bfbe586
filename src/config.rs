use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - Where listings are persisted
// - How ingestion runs are scheduled and bounded
// - HTTP behaviour shared by all adapters
// - The registered sources
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Persistence backend for listings
    pub store: StoreConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Registered sources, in configuration order
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Rejects configurations that would make a run meaningless.
    ///
    /// Source ids key the run summary and the stored record sets,
    /// so they must be unique.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.concurrency == 0 {
            anyhow::bail!("ingest.concurrency must be at least 1");
        }

        if self.http.max_attempts == 0 {
            anyhow::bail!("http.max_attempts must be at least 1");
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                anyhow::bail!("source with label '{}' has an empty id", source.label);
            }
            if !seen.insert(source.id.as_str()) {
                anyhow::bail!("duplicate source id '{}'", source.id);
            }
        }

        Ok(())
    }
}

// ------------------------------------------------------------
// Store configuration
// ------------------------------------------------------------
//
// `backend` selects the implementation:
// - "redis":  persistent store (production)
// - "memory": process-local store (dry runs, nothing survives exit)
//
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Redis {
        /// Connection URL, e.g. redis://127.0.0.1/
        url: String,

        /// Key namespace for every key written by the collector
        #[serde(default = "default_prefix")]
        prefix: String,
    },
    Memory,
}

fn default_prefix() -> String {
    "jobs".to_string()
}

// ------------------------------------------------------------
// Ingest configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Number of sources processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sources whose oldest record is younger than this are skipped.
    ///
    /// NOTE:
    /// Unset or 0 means every source is always stale, so a first
    /// run is never silently skipped.
    pub freshness_window_minutes: Option<u64>,

    /// When set, the collector stays alive and repeats the run
    /// on this interval. When unset, it runs once and exits.
    pub run_interval_secs: Option<u64>,
}

impl IngestConfig {
    pub fn freshness_window(&self) -> Option<chrono::Duration> {
        match self.freshness_window_minutes {
            None | Some(0) => None,
            Some(minutes) => chrono::Duration::try_minutes(minutes as i64),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            freshness_window_minutes: None,
            run_interval_secs: None,
        }
    }
}

fn default_concurrency() -> usize {
    5
}

// ------------------------------------------------------------
// HTTP configuration
// ------------------------------------------------------------
//
// Shared by every adapter through the retrying fetcher.
//
// Worst-case duration of a single request is roughly:
//     max_attempts * timeout + (max_attempts - 1) * backoff
//
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff step between attempts (attempt * backoff_ms)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound of random jitter added to each backoff
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            jitter_ms: default_jitter_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// One registered source. `adapter` selects the implementation
// from the adapter registry (see `sources::get_adapter`).
//
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Stable identifier, used as the stored `source_id`
    pub id: String,

    /// Human readable name used in logs and reports
    pub label: String,

    /// Adapter kind (e.g. "jane_street", "optiver")
    pub adapter: String,

    /// Enables or disables this source at runtime
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn applies_defaults_for_optional_blocks() {
        let cfg = parse(
            r#"{
                "store": { "backend": "memory" },
                "sources": [
                    { "id": "mako", "label": "Mako", "adapter": "mako" }
                ]
            }"#,
        );

        assert_eq!(cfg.ingest.concurrency, 5);
        assert!(cfg.ingest.freshness_window().is_none());
        assert_eq!(cfg.http.max_attempts, 3);
        assert_eq!(cfg.http.timeout(), Duration::from_secs(30));
        assert!(cfg.sources[0].enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn redis_store_uses_default_prefix() {
        let cfg = parse(
            r#"{
                "store": { "backend": "redis", "url": "redis://127.0.0.1/" },
                "sources": []
            }"#,
        );

        match cfg.store {
            StoreConfig::Redis { url, prefix } => {
                assert_eq!(url, "redis://127.0.0.1/");
                assert_eq!(prefix, "jobs");
            }
            StoreConfig::Memory => panic!("expected redis backend"),
        }
    }

    #[test]
    fn zero_window_means_always_stale() {
        let cfg = parse(
            r#"{
                "store": { "backend": "memory" },
                "ingest": { "freshness_window_minutes": 0 },
                "sources": []
            }"#,
        );
        assert!(cfg.ingest.freshness_window().is_none());

        let cfg = parse(
            r#"{
                "store": { "backend": "memory" },
                "ingest": { "freshness_window_minutes": 90 },
                "sources": []
            }"#,
        );
        assert_eq!(
            cfg.ingest.freshness_window(),
            Some(chrono::Duration::minutes(90))
        );
    }

    #[test]
    fn rejects_duplicate_source_ids() {
        let cfg = parse(
            r#"{
                "store": { "backend": "memory" },
                "sources": [
                    { "id": "drw", "label": "DRW", "adapter": "drw" },
                    { "id": "drw", "label": "DRW again", "adapter": "drw" }
                ]
            }"#,
        );

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let cfg = parse(
            r#"{
                "store": { "backend": "memory" },
                "ingest": { "concurrency": 0 },
                "sources": []
            }"#,
        );

        assert!(cfg.validate().is_err());
    }
}
