use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{error, info};

use crate::error::SourceError;

/// Why a source was not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Every stored record is younger than the freshness window.
    Fresh { oldest_seen: DateTime<Utc> },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Fresh { oldest_seen } => {
                write!(f, "fresh (oldest record seen {})", oldest_seen.to_rfc3339())
            }
        }
    }
}

/// Final state of one source after a run.
#[derive(Debug)]
pub enum SourceOutcome {
    Skipped(SkipReason),

    /// Number of listings now stored for the source (may be 0).
    Succeeded(usize),

    Failed(SourceError),
}

/// ============================================================
/// RunSummary
/// ============================================================
///
/// Per-source outcome of one orchestrator run, keyed by source id.
///
/// Built once every task finished; never persisted.
#[derive(Debug, Default)]
pub struct RunSummary {
    outcomes: BTreeMap<String, SourceOutcome>,
}

impl RunSummary {
    pub fn record(&mut self, source_id: impl Into<String>, outcome: SourceOutcome) {
        self.outcomes.insert(source_id.into(), outcome);
    }

    #[cfg(test)]
    pub fn get(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes.get(source_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceOutcome)> {
        self.outcomes.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Ids of sources that fetched and stored successfully.
    pub fn succeeded(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, o)| matches!(o, SourceOutcome::Succeeded(_)))
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids of sources skipped as fresh.
    pub fn skipped(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, o)| matches!(o, SourceOutcome::Skipped(_)))
            .map(|(id, _)| id)
            .collect()
    }

    /// Failed sources with a human readable message.
    pub fn failures(&self) -> BTreeMap<&str, String> {
        self.iter()
            .filter_map(|(id, o)| match o {
                SourceOutcome::Failed(e) => Some((id, e.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Logs the success list and the failure map.
    ///
    /// Partial failure is reported, never escalated.
    pub fn log_report(&self) {
        let succeeded = self.succeeded();
        if !succeeded.is_empty() {
            info!("fetched listings from: {}", succeeded.join(", "));
        }

        let skipped = self.skipped();
        if !skipped.is_empty() {
            info!("skipped (still fresh): {}", skipped.join(", "));
        }

        for (id, message) in self.failures() {
            error!("failed to fetch from {}: {}", id, message);
        }
    }
}
