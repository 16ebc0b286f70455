//! Source adapters and the paced, lazy listing scan built on top of them.
//!
//! An adapter only knows how to fetch one result page and how to turn one raw
//! listing into a [`BusinessRecord`]. Pacing, retries, throttling and the
//! result cap live in [`SourceScan`], so every source gets the same
//! degrade-not-abort behavior.

pub mod directory_a;
pub mod directory_b;
pub(crate) mod http;
pub mod maps;
mod markup;

use std::collections::VecDeque;

use async_trait::async_trait;
use leadscan_core::{BusinessRecord, Source};
use serde::Serialize;

use crate::error::{FailureKind, ScraperError};
use crate::rate_limit::{retry_source_request, RateController, RetryPolicy};

pub use directory_a::DirectoryAAdapter;
pub use directory_b::DirectoryBAdapter;
pub use maps::MapsAdapter;

/// Hard stop for sources whose pagination never ends.
const MAX_PAGES: u32 = 50;

/// Position in a source's result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// 1-based page number.
    Page(u32),
    /// Opaque continuation token issued by the source.
    Token(String),
}

/// One listing as fetched, before parsing.
#[derive(Debug, Clone)]
pub enum RawListing {
    /// An HTML fragment holding one result card.
    Html(String),
    /// One element of a JSON result array.
    Json(serde_json::Value),
}

/// One page of listings plus the cursor of the following page, if any.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub listings: Vec<RawListing>,
    pub next: Option<PageCursor>,
}

/// Capability set every business source provides.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Cursor of the first result page.
    fn first_page(&self) -> PageCursor {
        PageCursor::Page(1)
    }

    /// Fetches one page of raw listings for `industry`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScraperError`] whose [`FailureKind`] decides whether the
    /// scan retries, cools down or gives up on this source.
    async fn fetch_page(
        &self,
        industry: &str,
        cursor: &PageCursor,
    ) -> Result<ListingPage, ScraperError>;

    /// Turns one raw listing into a record.
    ///
    /// # Errors
    ///
    /// [`ScraperError::Parse`] skips the listing; [`ScraperError::QuotaExhausted`]
    /// ends the scan. Other errors also skip the listing.
    async fn parse_listing(
        &self,
        raw: RawListing,
        industry: &str,
    ) -> Result<BusinessRecord, ScraperError>;
}

impl<'s> dyn SourceAdapter + 's {
    /// Starts a fresh, lazy scan of this source for `industry`, yielding at most
    /// `max_results` records.
    #[must_use]
    pub fn search<'a>(
        &'a self,
        rate: &'a RateController,
        retry: RetryPolicy,
        industry: &str,
        max_results: usize,
    ) -> SourceScan<'a> {
        SourceScan::new(self, rate, retry, industry, max_results)
    }
}

/// How a (source, industry) scan ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// The source ran out of results.
    Completed,
    /// The per-industry result cap was reached.
    CapReached,
    /// The source's request quota ran out; results so far are kept.
    QuotaExhausted,
    /// The source failed and was abandoned; results so far are kept.
    Degraded { kind: FailureKind, reason: String },
    /// The run was cancelled while this source was being scanned.
    Cancelled,
}

impl SourceOutcome {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceOutcome::Degraded { .. })
    }

    fn from_error(err: &ScraperError) -> Self {
        match err.kind() {
            FailureKind::QuotaExhausted => SourceOutcome::QuotaExhausted,
            kind => SourceOutcome::Degraded {
                kind,
                reason: err.to_string(),
            },
        }
    }
}

/// Lazy, finite sequence of records from one source for one industry.
///
/// Every listing is preceded by [`RateController::wait_before_request`], every
/// page after the first by [`RateController::wait_page_transition`]. Not
/// restartable: build a new scan to start over.
pub struct SourceScan<'a> {
    adapter: &'a dyn SourceAdapter,
    rate: &'a RateController,
    retry: RetryPolicy,
    industry: String,
    max_results: usize,
    pending: VecDeque<RawListing>,
    cursor: Option<PageCursor>,
    pages_fetched: u32,
    yielded: usize,
    skipped: usize,
    outcome: Option<SourceOutcome>,
}

impl<'a> SourceScan<'a> {
    #[must_use]
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        rate: &'a RateController,
        retry: RetryPolicy,
        industry: &str,
        max_results: usize,
    ) -> Self {
        Self {
            adapter,
            rate,
            retry,
            industry: industry.to_owned(),
            max_results,
            pending: VecDeque::new(),
            cursor: Some(adapter.first_page()),
            pages_fetched: 0,
            yielded: 0,
            skipped: 0,
            outcome: None,
        }
    }

    #[must_use]
    pub fn source(&self) -> Source {
        self.adapter.source()
    }

    /// Listings skipped because they could not be parsed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Set once the sequence has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<&SourceOutcome> {
        self.outcome.as_ref()
    }

    /// Ends the sequence early from the outside (e.g. on cancellation).
    pub fn stop(&mut self, outcome: SourceOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    /// Consumes the scan and returns how it ended.
    #[must_use]
    pub fn into_outcome(self) -> SourceOutcome {
        self.outcome.unwrap_or(SourceOutcome::Completed)
    }

    /// Produces the next record, or `None` once the sequence has ended.
    pub async fn next(&mut self) -> Option<BusinessRecord> {
        let source = self.adapter.source();
        loop {
            if self.outcome.is_some() {
                return None;
            }
            if self.yielded >= self.max_results {
                self.outcome = Some(SourceOutcome::CapReached);
                return None;
            }

            if let Some(raw) = self.pending.pop_front() {
                self.rate.wait_before_request(source).await;
                match self.adapter.parse_listing(raw, &self.industry).await {
                    Ok(record) => {
                        self.yielded += 1;
                        return Some(record);
                    }
                    Err(err) if err.kind() == FailureKind::QuotaExhausted => {
                        tracing::warn!(%source, industry = %self.industry, error = %err, "quota exhausted");
                        self.outcome = Some(SourceOutcome::QuotaExhausted);
                        return None;
                    }
                    Err(err) => {
                        self.skipped += 1;
                        tracing::debug!(
                            %source,
                            industry = %self.industry,
                            reason = %err,
                            "listing skipped"
                        );
                        continue;
                    }
                }
            }

            let Some(cursor) = self.cursor.take() else {
                self.outcome = Some(SourceOutcome::Completed);
                return None;
            };
            if self.pages_fetched >= MAX_PAGES {
                tracing::warn!(%source, industry = %self.industry, "page limit reached");
                self.outcome = Some(SourceOutcome::Completed);
                return None;
            }

            if self.pages_fetched == 0 {
                self.rate.wait_before_request(source).await;
            } else {
                self.rate.wait_page_transition(source).await;
            }

            let adapter = self.adapter;
            let industry = self.industry.as_str();
            let current = &cursor;
            let fetched = retry_source_request(self.rate, source, self.retry, move || {
                adapter.fetch_page(industry, current)
            })
            .await;

            match fetched {
                Ok(page) => {
                    self.pages_fetched += 1;
                    tracing::debug!(
                        %source,
                        industry = %self.industry,
                        page = self.pages_fetched,
                        listings = page.listings.len(),
                        "page fetched"
                    );
                    if !page.listings.is_empty() && page.next.as_ref() != Some(&cursor) {
                        self.cursor = page.next;
                    }
                    self.pending.extend(page.listings);
                }
                Err(err) => {
                    let outcome = SourceOutcome::from_error(&err);
                    tracing::warn!(
                        %source,
                        industry = %self.industry,
                        error = %err,
                        "source scan ended early"
                    );
                    self.outcome = Some(outcome);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::rate_limit::{DelayRange, RateSettings};

    fn quiet_rate() -> RateController {
        RateController::new(RateSettings {
            request_delay: DelayRange::ZERO,
            page_delay: DelayRange::ZERO,
            cooldown: Duration::ZERO,
            max_cooldown: Duration::ZERO,
            identities: vec!["test-agent".to_owned()],
        })
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_step: Duration::ZERO,
        }
    }

    /// Serves `pages` of names; a name starting with `!` fails to parse.
    struct PagedFake {
        pages: Vec<Vec<&'static str>>,
        fetches: AtomicU32,
        fail_with: Option<fn() -> ScraperError>,
    }

    impl PagedFake {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                fetches: AtomicU32::new(0),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for PagedFake {
        fn source(&self) -> Source {
            Source::DirectoryB
        }

        async fn fetch_page(
            &self,
            _industry: &str,
            cursor: &PageCursor,
        ) -> Result<ListingPage, ScraperError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            let PageCursor::Page(n) = cursor else {
                panic!("unexpected cursor {cursor:?}");
            };
            let idx = (*n as usize) - 1;
            let listings = self.pages[idx]
                .iter()
                .map(|name| RawListing::Html((*name).to_owned()))
                .collect();
            let next = (idx + 1 < self.pages.len()).then(|| PageCursor::Page(n + 1));
            Ok(ListingPage { listings, next })
        }

        async fn parse_listing(
            &self,
            raw: RawListing,
            industry: &str,
        ) -> Result<BusinessRecord, ScraperError> {
            let RawListing::Html(name) = raw else {
                panic!("html expected");
            };
            if name.starts_with('!') {
                return Err(ScraperError::Parse {
                    origin: Source::DirectoryB,
                    reason: "no name".to_owned(),
                });
            }
            BusinessRecord::new(&name, industry, Source::DirectoryB).map_err(|e| {
                ScraperError::Parse {
                    origin: Source::DirectoryB,
                    reason: e.to_string(),
                }
            })
        }
    }

    async fn drain(scan: &mut SourceScan<'_>) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(record) = scan.next().await {
            names.push(record.name);
        }
        names
    }

    #[tokio::test]
    async fn walks_pages_in_order_and_skips_bad_listings() {
        let fake = PagedFake::new(vec![vec!["A", "!broken", "B"], vec!["C"]]);
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 10);

        assert_eq!(drain(&mut scan).await, vec!["A", "B", "C"]);
        assert_eq!(scan.skipped(), 1);
        assert_eq!(scan.into_outcome(), SourceOutcome::Completed);
        assert_eq!(fake.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_at_max_results_without_fetching_more_pages() {
        let fake = PagedFake::new(vec![vec!["A", "B"], vec!["C", "D"]]);
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 2);

        assert_eq!(drain(&mut scan).await, vec!["A", "B"]);
        assert_eq!(scan.into_outcome(), SourceOutcome::CapReached);
        assert_eq!(fake.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_degrades_after_retries() {
        let mut fake = PagedFake::new(vec![vec!["A"]]);
        fake.fail_with = Some(|| ScraperError::UnexpectedStatus {
            status: 503,
            url: "https://www.pkt.pl/szukaj".to_owned(),
        });
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 10);

        assert!(drain(&mut scan).await.is_empty());
        let outcome = scan.into_outcome();
        assert!(
            matches!(outcome, SourceOutcome::Degraded { kind: FailureKind::Transient, .. }),
            "got {outcome:?}"
        );
        // first attempt + 3 retries
        assert_eq!(fake.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn throttled_source_degrades_after_one_cooldown_retry() {
        let mut fake = PagedFake::new(vec![vec!["A"]]);
        fake.fail_with = Some(|| ScraperError::Throttled {
            origin: Source::DirectoryB,
            reason: "HTTP 429".to_owned(),
        });
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 10);

        assert!(drain(&mut scan).await.is_empty());
        assert!(matches!(
            scan.into_outcome(),
            SourceOutcome::Degraded { kind: FailureKind::Throttled, .. }
        ));
        assert_eq!(fake.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(rate.throttle_events(), 1);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_not_degradation() {
        let mut fake = PagedFake::new(vec![vec!["A"]]);
        fake.fail_with = Some(|| ScraperError::QuotaExhausted {
            origin: Source::Maps,
            limit: 0,
        });
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 10);

        assert!(drain(&mut scan).await.is_empty());
        let outcome = scan.into_outcome();
        assert_eq!(outcome, SourceOutcome::QuotaExhausted);
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn ended_scan_keeps_returning_none() {
        let fake = PagedFake::new(vec![vec!["A"]]);
        let rate = quiet_rate();
        let adapter: &dyn SourceAdapter = &fake;
        let mut scan = adapter.search(&rate, no_backoff(), "kawiarnie", 10);

        assert_eq!(drain(&mut scan).await, vec!["A"]);
        assert!(scan.next().await.is_none());
        assert_eq!(fake.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = SourceOutcome::Degraded {
            kind: FailureKind::Throttled,
            reason: "HTTP 429".to_owned(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["kind"], "throttled");
    }
}
