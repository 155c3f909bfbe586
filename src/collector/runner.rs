use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{error, info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::{
    error::{RunError, SourceError},
    http_client::HttpFetcher,
    metrics::METRICS,
    sources::SourceRegistration,
    store::ListingStore,
};

use super::freshness::{self, Freshness};
use super::summary::{RunSummary, SkipReason, SourceOutcome};

/// Shared dependencies handed to every source task.
///
/// Passed explicitly; nothing in the pipeline reaches for a
/// global store or client.
#[derive(Clone)]
pub struct RunContext {
    pub store: Arc<dyn ListingStore>,
    pub http: HttpFetcher,
}

/// Per-run knobs, read once at the start of the run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of sources processed at the same time
    pub concurrency: usize,

    /// `None` means every source is stale
    pub freshness_window: Option<Duration>,
}

/// Runs every registered source once and reports per-source outcomes.
///
/// FLOW (per source, in its own task):
/// - freshness check   -> Skipped when fresh
/// - adapter.fetch     -> Failed on transport error
/// - adapter.parse     -> Failed on structural error
/// - store.replace     -> Failed on storage error
/// - otherwise         -> Succeeded(records written)
///
/// GUARANTEES:
/// - At most `concurrency` sources run at the same time
/// - A failing (or panicking) source never affects another one
/// - The summary is returned only after every task finished
///
/// ERRORS:
/// - `concurrency == 0`
/// - Two registrations share an id
///
/// Completion order is not defined; the summary is keyed by id.
pub async fn run_all(
    sources: &[SourceRegistration],
    ctx: &RunContext,
    opts: &RunOptions,
) -> Result<RunSummary, RunError> {
    if opts.concurrency == 0 {
        return Err(RunError::InvalidConcurrency);
    }

    // Ids key both the stored sets and the summary.
    let mut ids = HashSet::with_capacity(sources.len());
    if let Some(dup) = sources.iter().find(|s| !ids.insert(s.id.as_str())) {
        return Err(RunError::DuplicateSource(dup.id.clone()));
    }

    info!(
        "starting run: {} source(s), concurrency {}",
        sources.len(),
        opts.concurrency
    );

    let permits = Arc::new(Semaphore::new(opts.concurrency));
    let mut tasks = JoinSet::new();
    let mut task_sources = HashMap::with_capacity(sources.len());

    for registration in sources.iter().cloned() {
        let permits = permits.clone();
        let ctx = ctx.clone();
        let window = opts.freshness_window;
        let id = registration.id.clone();

        let handle = tasks.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => run_source(&registration, &ctx, window).await,
                Err(_) => SourceOutcome::Failed(SourceError::Aborted("worker pool closed".into())),
            };
            (registration.id, outcome)
        });
        task_sources.insert(handle.id(), id);
    }

    let mut summary = RunSummary::default();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, outcome)) => summary.record(id, outcome),

            // A panicking adapter takes down its own task only.
            Err(e) => {
                let id = task_sources
                    .remove(&e.id())
                    .unwrap_or_else(|| "<unknown>".to_string());
                error!("[{}] task aborted: {}", id, e);
                METRICS.sources_failed.fetch_add(1, Ordering::Relaxed);
                summary.record(id, SourceOutcome::Failed(SourceError::Aborted(e.to_string())));
            }
        }
    }

    METRICS.runs_completed.fetch_add(1, Ordering::Relaxed);
    info!(
        "run finished: {} succeeded, {} skipped, {} failed",
        summary.succeeded().len(),
        summary.skipped().len(),
        summary.failures().len()
    );

    Ok(summary)
}

/// One source, start to finish. Never fails: errors become outcomes.
async fn run_source(
    registration: &SourceRegistration,
    ctx: &RunContext,
    window: Option<Duration>,
) -> SourceOutcome {
    let outcome = match ingest(registration, ctx, window).await {
        Ok(outcome) => outcome,
        Err(e) => SourceOutcome::Failed(e),
    };

    match &outcome {
        SourceOutcome::Skipped(reason) => {
            info!("[{}] skipped: {}", registration.label, reason);
            METRICS.sources_skipped.fetch_add(1, Ordering::Relaxed);
        }
        SourceOutcome::Succeeded(count) => {
            info!("[{}] stored {} listings", registration.label, count);
            METRICS.sources_succeeded.fetch_add(1, Ordering::Relaxed);
            METRICS.records_written.fetch_add(*count, Ordering::Relaxed);
        }
        SourceOutcome::Failed(e) => {
            error!("[{}] {}", registration.label, e);
            METRICS.sources_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    outcome
}

async fn ingest(
    registration: &SourceRegistration,
    ctx: &RunContext,
    window: Option<Duration>,
) -> Result<SourceOutcome, SourceError> {
    let id = registration.id.as_str();

    if let Freshness::Fresh { oldest_seen } =
        freshness::check(ctx.store.as_ref(), id, Utc::now(), window).await?
    {
        return Ok(SourceOutcome::Skipped(SkipReason::Fresh { oldest_seen }));
    }

    info!("[{}] fetching via {}", registration.label, registration.adapter.name());
    let raw = registration.adapter.fetch(&ctx.http).await?;

    let parsed = registration.adapter.parse(&raw)?;
    if parsed.dropped > 0 {
        info!(
            "[{}] parsed {} listings, dropped {} malformed",
            registration.label,
            parsed.records.len(),
            parsed.dropped
        );
    }

    let written = ctx.store.replace(id, &parsed.records, Utc::now()).await?;
    Ok(SourceOutcome::Succeeded(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use crate::config::HttpConfig;
    use crate::error::{FetchError, ParseError};
    use crate::schema::{ListingDraft, ParsedListings, RawPayload};
    use crate::sources::adapter::SourceAdapter;
    use crate::store::MemoryListingStore;

    #[derive(Clone)]
    enum Behavior {
        Listings(Vec<ListingDraft>),
        FetchFails,
        ParseFails,
        Panics,
    }

    #[derive(Default)]
    struct FetchCounters {
        fetches: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    struct StubAdapter {
        behavior: Behavior,
        delay: std::time::Duration,
        counters: Arc<FetchCounters>,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, _http: &HttpFetcher) -> Result<RawPayload, FetchError> {
            self.counters.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

            match &self.behavior {
                Behavior::Listings(drafts) => {
                    Ok(RawPayload::Text(serde_json::to_string(drafts).unwrap()))
                }
                Behavior::ParseFails => Ok(RawPayload::Text("garbage".into())),
                Behavior::FetchFails => Err(FetchError::Status {
                    url: "https://stub.invalid/jobs".into(),
                    status: 503,
                }),
                Behavior::Panics => panic!("adapter bug"),
            }
        }

        fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
            if matches!(self.behavior, Behavior::ParseFails) {
                return Err(ParseError::MissingContainer("stub container"));
            }
            Ok(ParsedListings {
                records: serde_json::from_str(raw.text()?)?,
                dropped: 0,
            })
        }
    }

    fn drafts(prefix: &str, n: usize) -> Vec<ListingDraft> {
        (0..n)
            .map(|i| ListingDraft {
                title: format!("{prefix} role {i}"),
                description: "desc".into(),
                url: format!("https://{prefix}.example/jobs/{i}"),
                location: "Remote".into(),
                posted_at: None,
            })
            .collect()
    }

    fn register(id: &str, behavior: Behavior, counters: &Arc<FetchCounters>) -> SourceRegistration {
        register_slow(id, behavior, std::time::Duration::ZERO, counters)
    }

    fn register_slow(
        id: &str,
        behavior: Behavior,
        delay: std::time::Duration,
        counters: &Arc<FetchCounters>,
    ) -> SourceRegistration {
        SourceRegistration {
            id: id.into(),
            label: id.to_uppercase(),
            adapter: Arc::new(StubAdapter {
                behavior,
                delay,
                counters: counters.clone(),
            }),
        }
    }

    fn context(store: Arc<MemoryListingStore>) -> RunContext {
        RunContext {
            store,
            http: HttpFetcher::new(&HttpConfig::default()).unwrap(),
        }
    }

    fn options(concurrency: usize, window_minutes: Option<i64>) -> RunOptions {
        RunOptions {
            concurrency,
            freshness_window: window_minutes.map(Duration::minutes),
        }
    }

    #[tokio::test]
    async fn one_failing_source_does_not_leak() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![
            register("alpha", Behavior::Listings(drafts("alpha", 3)), &counters),
            register("broken-fetch", Behavior::FetchFails, &counters),
            register("broken-parse", Behavior::ParseFails, &counters),
            register("gamma", Behavior::Listings(drafts("gamma", 2)), &counters),
        ];

        let summary = run_all(&sources, &context(store.clone()), &options(3, None))
            .await
            .unwrap();

        assert_eq!(summary.len(), 4);
        assert_eq!(summary.succeeded(), vec!["alpha", "gamma"]);
        assert!(matches!(
            summary.get("broken-fetch"),
            Some(SourceOutcome::Failed(SourceError::Fetch(_)))
        ));
        assert!(matches!(
            summary.get("broken-parse"),
            Some(SourceOutcome::Failed(SourceError::Parse(_)))
        ));
        assert_eq!(store.listings_for("alpha").await.unwrap().len(), 3);
        assert_eq!(store.listings_for("gamma").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_run_inside_window_skips_everything() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![
            register("alpha", Behavior::Listings(drafts("alpha", 2)), &counters),
            register("beta", Behavior::Listings(drafts("beta", 1)), &counters),
        ];
        let ctx = context(store);
        let opts = options(2, Some(60));

        let first = run_all(&sources, &ctx, &opts).await.unwrap();
        assert_eq!(first.succeeded().len(), 2);

        let second = run_all(&sources, &ctx, &opts).await.unwrap();
        assert_eq!(second.skipped(), vec!["alpha", "beta"]);
        assert_eq!(counters.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_source_is_retried_on_next_run() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![register("broken", Behavior::FetchFails, &counters)];
        let ctx = context(store);
        let opts = options(1, Some(60));

        run_all(&sources, &ctx, &opts).await.unwrap();
        let second = run_all(&sources, &ctx, &opts).await.unwrap();

        assert_eq!(second.failures().len(), 1);
        assert_eq!(counters.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_result_clears_previous_listings() {
        let store = Arc::new(MemoryListingStore::new());
        store
            .replace("alpha", &drafts("alpha", 4), Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![register("alpha", Behavior::Listings(Vec::new()), &counters)];

        let summary = run_all(&sources, &context(store.clone()), &options(1, None))
            .await
            .unwrap();

        assert!(matches!(summary.get("alpha"), Some(SourceOutcome::Succeeded(0))));
        assert!(store.listings_for("alpha").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_keeps_previous_listings() {
        let store = Arc::new(MemoryListingStore::new());
        store
            .replace("alpha", &drafts("old", 2), Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let before = store.snapshot().unwrap();
        store.fail_replace_for("alpha");

        let counters = Arc::new(FetchCounters::default());
        let sources = vec![
            register("alpha", Behavior::Listings(drafts("new", 5)), &counters),
            register("beta", Behavior::Listings(drafts("beta", 1)), &counters),
        ];

        let summary = run_all(&sources, &context(store.clone()), &options(2, None))
            .await
            .unwrap();

        assert!(matches!(
            summary.get("alpha"),
            Some(SourceOutcome::Failed(SourceError::Storage(_)))
        ));
        assert!(matches!(summary.get("beta"), Some(SourceOutcome::Succeeded(1))));

        let alpha_after = store.listings_for("alpha").await.unwrap();
        let alpha_before: Vec<_> = before.into_iter().filter(|r| r.source_id == "alpha").collect();
        assert_eq!(alpha_after, alpha_before);
    }

    #[tokio::test]
    async fn panicking_adapter_is_isolated() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![
            register("explodes", Behavior::Panics, &counters),
            register("alpha", Behavior::Listings(drafts("alpha", 1)), &counters),
        ];

        let summary = run_all(&sources, &context(store), &options(2, None))
            .await
            .unwrap();

        assert!(matches!(
            summary.get("explodes"),
            Some(SourceOutcome::Failed(SourceError::Aborted(_)))
        ));
        assert_eq!(summary.succeeded(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let delay = std::time::Duration::from_millis(100);
        let sources: Vec<_> = (0..5)
            .map(|i| {
                let id = format!("s{i}");
                register_slow(&id, Behavior::Listings(drafts(&id, 1)), delay, &counters)
            })
            .collect();

        let started = Instant::now();
        let summary = run_all(&sources, &context(store), &options(2, None))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(summary.succeeded().len(), 5);
        assert_eq!(counters.peak.load(Ordering::SeqCst), 2);
        // 5 sources, 2 at a time: at least 3 sequential waves
        assert!(elapsed >= delay * 3, "finished too fast: {elapsed:?}");
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![register("alpha", Behavior::Listings(Vec::new()), &counters)];

        let result = run_all(&sources, &context(store), &options(0, None)).await;

        assert!(matches!(result, Err(RunError::InvalidConcurrency)));
        assert_eq!(counters.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_before_any_fetch() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let sources = vec![
            register("alpha", Behavior::Listings(drafts("one", 1)), &counters),
            register("beta", Behavior::Listings(drafts("beta", 1)), &counters),
            register("alpha", Behavior::Listings(drafts("two", 2)), &counters),
        ];

        let result = run_all(&sources, &context(store.clone()), &options(2, None)).await;

        assert!(matches!(result, Err(RunError::DuplicateSource(id)) if id == "alpha"));
        assert_eq!(counters.fetches.load(Ordering::SeqCst), 0);
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn url_moves_to_the_latest_writer() {
        let store = Arc::new(MemoryListingStore::new());
        let counters = Arc::new(FetchCounters::default());
        let shared = drafts("shared", 1);
        let ctx = context(store.clone());

        run_all(
            &[register("board", Behavior::Listings(shared.clone()), &counters)],
            &ctx,
            &options(1, None),
        )
        .await
        .unwrap();
        run_all(
            &[register("company", Behavior::Listings(shared), &counters)],
            &ctx,
            &options(1, None),
        )
        .await
        .unwrap();

        let all = store.snapshot().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_id, "company");
    }
}
