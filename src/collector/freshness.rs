use chrono::{DateTime, Duration, Utc};

use crate::error::StorageError;
use crate::store::ListingStore;

/// Result of the freshness check for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetch the source.
    Stale,

    /// Every stored record was seen within the window; skip.
    Fresh { oldest_seen: DateTime<Utc> },
}

/// Decides whether `source_id` must be fetched again.
///
/// POLICY:
/// - No window configured (or zero)  -> stale
/// - No stored records               -> stale (never fetched, or emptied)
/// - Age of the OLDEST record > window -> stale
///
/// Using the oldest record means a source only counts as fresh when
/// all of its records were refreshed recently; a subset left behind
/// by an earlier partial write keeps the source stale.
pub async fn check(
    store: &dyn ListingStore,
    source_id: &str,
    now: DateTime<Utc>,
    window: Option<Duration>,
) -> Result<Freshness, StorageError> {
    let Some(window) = window.filter(|w| *w > Duration::zero()) else {
        return Ok(Freshness::Stale);
    };

    let oldest = store.oldest_seen(source_id).await?;
    Ok(classify(oldest, now, window))
}

fn classify(oldest: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> Freshness {
    match oldest {
        Some(oldest_seen) if now - oldest_seen <= window => Freshness::Fresh { oldest_seen },
        _ => Freshness::Stale,
    }
}
