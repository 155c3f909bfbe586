/// Collector module
///
/// This module groups all logic responsible for:
/// - Deciding which sources need a refresh (freshness)
/// - Running source adapters under bounded concurrency (runner)
/// - Reporting per-source outcomes (summary)
///
/// The collector layer acts as the orchestration layer between:
/// - Source adapters (Jane Street, Optiver, DRW, …)
/// - The listing store (persistence layer)
///
/// Design notes:
/// - Site-specific logic MUST NOT live here
/// - A failing source only ever affects its own outcome
pub mod freshness;
pub mod runner;
pub mod summary;
