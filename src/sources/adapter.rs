use std::sync::atomic::Ordering;

use log::{debug, warn};

use crate::error::{FetchError, ParseError, RecordFieldError};
use crate::http_client::HttpFetcher;
use crate::metrics::METRICS;
use crate::schema::{ListingDraft, ParsedListings, RawPayload};
use crate::util;

/// Upper bound on pages fetched for one source, whatever the
/// pagination widget claims.
pub const MAX_PAGES: usize = 50;

/// SourceAdapter is the core abstraction layer between:
/// - The generic ingestion orchestrator
/// - Site-specific career pages and job-board APIs
///
/// Each implementation must:
/// - Download whatever it needs from its site
/// - Translate the download into `ListingDraft`s
///
/// DESIGN GOALS:
/// - Zero site-specific logic outside adapters
/// - One adapter per upstream format
/// - No shared mutable state: adapters are plain values
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Adapter instances are shared across tasks
///
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {

    /// Returns the adapter kind.
    ///
    /// CONTRACT:
    /// - Must match `sources[].adapter` in configuration
    /// - Used for logging only; the stored owner is the
    ///   registration's source id, never this name
    ///
    fn name(&self) -> &'static str;

    /// Downloads the raw payload.
    ///
    /// NOTES:
    /// - May issue several requests (pagination)
    /// - All requests go through `http`, which owns retries,
    ///   timeouts and the user agent
    ///
    /// MUST NOT:
    /// - Touch the store or the filesystem
    ///
    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError>;

    /// Translates a raw payload into listings.
    ///
    /// OUTPUT:
    /// - Ok with every usable entry; unusable entries are
    ///   counted in `dropped` and logged
    /// - Err only when the expected container is missing or
    ///   the payload cannot be read at all
    ///
    /// IMPORTANT:
    /// - Pure: no I/O
    /// - An empty but well-formed payload is a valid, empty result
    ///
    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError>;
}

/// Keep the entries that convert, drop the ones that don't.
///
/// Each dropped entry is logged with the field that broke it and
/// counted in the global metrics; the caller gets the survivors
/// and the drop count.
pub fn collect_listings<T, I, F>(adapter: &str, entries: I, mut convert: F) -> ParsedListings
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<ListingDraft, RecordFieldError>,
{
    let mut parsed = ParsedListings::default();

    for (index, entry) in entries.into_iter().enumerate() {
        match convert(entry) {
            Ok(draft) => parsed.records.push(draft),
            Err(e) => {
                warn!("[{}] dropping entry #{}: {}", adapter, index, e);
                parsed.dropped += 1;
            }
        }
    }

    if parsed.dropped > 0 {
        METRICS
            .records_dropped
            .fetch_add(parsed.dropped, Ordering::Relaxed);
    }

    parsed
}

/// Download every page of a paginated listing.
///
/// Flow:
/// - GET `first_url`
/// - read the page count from the elements matching `pager`
/// - GET `page_url(n)` for n = 2..=count (capped at MAX_PAGES)
///
/// The first body is reused as page 1. Pages are fetched one after
/// another; each goes through the retrying fetcher on its own, and
/// any page failing terminally fails the whole fetch.
pub async fn fetch_paginated<F>(
    http: &HttpFetcher,
    adapter: &str,
    first_url: &str,
    pager: &'static str,
    page_url: F,
) -> Result<RawPayload, FetchError>
where
    F: Fn(usize) -> String + Send + Sync,
{
    let first = http.get_text(first_url).await?;
    let total = util::max_page_number(&first, pager)?.min(MAX_PAGES);
    debug!("[{}] {} page(s) to fetch", adapter, total);

    let mut pages = Vec::with_capacity(total);
    pages.push(first);

    for page in 2..=total {
        pages.push(http.get_text(&page_url(page)).await?);
    }

    Ok(RawPayload::Pages(pages))
}

/// Merge per-page results into one.
pub fn merge_pages(pages: impl IntoIterator<Item = ParsedListings>) -> ParsedListings {
    pages
        .into_iter()
        .fold(ParsedListings::default(), |mut acc, page| {
            acc.records.extend(page.records);
            acc.dropped += page.dropped;
            acc
        })
}
