//! Source adapter registry and factory
//!
//! This module provides:
//! - Central registration of all supported adapters
//! - A factory function to resolve adapters by kind
//! - The registration list built from configuration
//!
//! All site-specific logic must live in dedicated adapter modules.
//! The rest of the application must interact exclusively through
//! the `SourceAdapter` trait.

pub mod adapter;
mod akuna_capital;
mod deshaw;
mod drw;
mod five_rings;
mod hudson_river_trading;
mod jane_street;
mod mako;
mod millennium;
mod optiver;
mod tower_research;

use std::sync::Arc;

use log::{info, warn};

use adapter::SourceAdapter;
use crate::config::SourceConfig;

/// Binds a stable source id and a label to an adapter instance.
///
/// Immutable for the lifetime of the process. The id, not the
/// adapter kind, owns the stored listings: two registrations may
/// share an adapter kind under different ids.
#[derive(Clone)]
pub struct SourceRegistration {
    pub id: String,
    pub label: String,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl std::fmt::Debug for SourceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistration")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

/// Returns an adapter instance by kind.
///
/// CONTRACT:
/// - `kind` MUST match the `sources[].adapter` field in config.json
/// - Adapter kinds are lowercase snake_case and stable
///
/// THREADING:
/// - Adapters are wrapped in `Arc`
/// - The same adapter instance may be shared across tasks
///
pub fn get_adapter(kind: &str) -> Option<Arc<dyn SourceAdapter>> {
    match kind {
        "jane_street" => Some(Arc::new(jane_street::JaneStreetAdapter)),
        "akuna_capital" => Some(Arc::new(akuna_capital::AkunaCapitalAdapter)),
        "drw" => Some(Arc::new(drw::DrwAdapter)),
        "millennium" => Some(Arc::new(millennium::MillenniumAdapter)),
        "hudson_river_trading" => Some(Arc::new(hudson_river_trading::HudsonRiverTradingAdapter)),
        "deshaw" => Some(Arc::new(deshaw::DeShawAdapter)),
        "mako" => Some(Arc::new(mako::MakoAdapter)),
        "five_rings" => Some(Arc::new(five_rings::FiveRingsAdapter)),
        "optiver" => Some(Arc::new(optiver::OptiverAdapter)),
        "tower_research" => Some(Arc::new(tower_research::TowerResearchAdapter)),
        _ => None,
    }
}

/// Builds the ordered registration list from configuration.
///
/// - Disabled sources are left out
/// - Unknown adapter kinds are logged and left out; one typo in
///   config must not keep every other source from running
pub fn build_registrations(sources: &[SourceConfig]) -> Vec<SourceRegistration> {
    sources
        .iter()
        .filter(|s| s.enabled)
        .filter_map(|s| {
            let Some(adapter) = get_adapter(&s.adapter) else {
                warn!("source '{}' uses unknown adapter '{}', ignoring it", s.id, s.adapter);
                return None;
            };

            info!("registered {} ({}) with adapter {}", s.label, s.id, adapter.name());
            Some(SourceRegistration {
                id: s.id.clone(),
                label: s.label.clone(),
                adapter,
            })
        })
        .collect()
}
