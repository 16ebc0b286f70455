//! Scan orchestration: industries × sources, merge, verify, summarize.
//!
//! The run walks `Idle → Scanning(source, industry) → Verifying → Finalized`.
//! Failure of one (source, industry) pair is recorded and the run moves on;
//! only a run that collected nothing at all (and was not cancelled) fails.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use leadscan_core::{BusinessRecord, MergedBusiness, ScanConfig, Source, WebsiteStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dedup::Deduplicator;
use crate::error::{ScanError, ScraperError};
use crate::rate_limit::{RateController, RateSettings, RetryPolicy};
use crate::sources::{
    DirectoryAAdapter, DirectoryBAdapter, MapsAdapter, SourceAdapter, SourceOutcome,
};
use crate::verifier::{VerifierSettings, WebsiteVerifier};

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning { source: Source, industry: String },
    Verifying,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Industries in scan order.
    pub industries: Vec<String>,
    /// Cap shared by all sources of one industry.
    pub max_results_per_industry: usize,
    /// Sources of one industry scanned in parallel; 1 means sequential.
    pub max_concurrent_sources: usize,
    pub retry: RetryPolicy,
}

impl ScanOptions {
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            industries: config.industries.clone(),
            max_results_per_industry: config.max_results_per_industry,
            max_concurrent_sources: config.max_concurrent_sources,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_step: Duration::from_millis(config.retry_backoff_ms),
            },
        }
    }
}

/// One (source, industry) scan as it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRun {
    pub source: Source,
    pub industry: String,
    /// Records kept from this scan.
    pub records: usize,
    /// Listings that failed to parse.
    pub skipped: usize,
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedSource {
    pub source: Source,
    pub industry: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Raw records kept per source, before merging.
    pub records_per_source: BTreeMap<Source, usize>,
    pub with_website: usize,
    pub without_website: usize,
    pub unknown: usize,
    pub elapsed_ms: u64,
    pub throttle_events: u32,
    pub degraded: Vec<DegradedSource>,
    pub runs: Vec<SourceRun>,
    pub raw_records: usize,
    pub duplicates_merged: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub businesses: Vec<MergedBusiness>,
    pub summary: ScanSummary,
}

impl ScanResult {
    /// Businesses verified to have no website of their own.
    pub fn leads(&self) -> impl Iterator<Item = &MergedBusiness> {
        self.businesses.iter().filter(|b| b.is_lead())
    }
}

/// Records and runs gathered for one industry.
#[derive(Default)]
struct IndustryHarvest {
    records: Vec<BusinessRecord>,
    runs: Vec<SourceRun>,
    cancelled: bool,
}

struct SourceHarvest {
    records: Vec<BusinessRecord>,
    run: SourceRun,
}

impl SourceHarvest {
    fn cancelled(&self) -> bool {
        self.run.outcome == SourceOutcome::Cancelled
    }
}

pub struct ScanOrchestrator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    rate: Arc<RateController>,
    verifier: Option<WebsiteVerifier>,
    options: ScanOptions,
    phase: Mutex<ScanPhase>,
}

impl ScanOrchestrator {
    /// Adapters are scanned in source-priority order; a second adapter for
    /// an already present source is dropped.
    #[must_use]
    pub fn new(
        mut adapters: Vec<Box<dyn SourceAdapter>>,
        rate: Arc<RateController>,
        verifier: Option<WebsiteVerifier>,
        options: ScanOptions,
    ) -> Self {
        adapters.sort_by_key(|a| a.source());
        adapters.dedup_by_key(|a| a.source());
        Self {
            adapters,
            rate,
            verifier,
            options,
            phase: Mutex::new(ScanPhase::Idle),
        }
    }

    /// Wires the three production adapters and the verifier from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScraperError> {
        let rate = Arc::new(RateController::new(RateSettings::from_config(config)));
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
        for source in config.ordered_sources() {
            let adapter: Box<dyn SourceAdapter> = match source {
                Source::Maps => Box::new(MapsAdapter::new(
                    &config.maps_url,
                    &config.city,
                    config.maps_api_key.clone(),
                    config.maps_quota,
                    timeout,
                    Arc::clone(&rate),
                )?),
                Source::DirectoryA => Box::new(DirectoryAAdapter::new(
                    &config.directory_a_url,
                    &config.city,
                    timeout,
                    Arc::clone(&rate),
                )?),
                Source::DirectoryB => Box::new(DirectoryBAdapter::new(
                    &config.directory_b_url,
                    &config.city,
                    timeout,
                    Arc::clone(&rate),
                )?),
            };
            adapters.push(adapter);
        }

        let verifier = if config.verify_websites {
            Some(WebsiteVerifier::new(VerifierSettings::from_config(config))?)
        } else {
            None
        };

        Ok(Self::new(
            adapters,
            rate,
            verifier,
            ScanOptions::from_config(config),
        ))
    }

    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_phase(&self, phase: ScanPhase) {
        tracing::debug!(phase = ?phase, "scan phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Runs the whole scan.
    ///
    /// Cancelling `cancel` stops at the next listing or verification boundary
    /// and returns what was gathered so far with `summary.cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NoDataCollected`] if every (source, industry)
    /// pair came back empty and the run was not cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ScanResult, ScanError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let throttle_baseline = self.rate.throttle_events();

        tracing::info!(
            %run_id,
            industries = self.options.industries.len(),
            sources = self.adapters.len(),
            cap = self.options.max_results_per_industry,
            verify = self.verifier.is_some(),
            "scan started"
        );

        let mut records = Vec::new();
        let mut runs = Vec::new();
        let mut cancelled = false;

        for industry in &self.options.industries {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let harvest = if self.options.max_concurrent_sources > 1 {
                self.scan_industry_concurrent(industry, cancel).await
            } else {
                self.scan_industry_sequential(industry, cancel).await
            };
            records.extend(harvest.records);
            runs.extend(harvest.runs);
            if harvest.cancelled {
                cancelled = true;
                break;
            }
        }

        let degraded: Vec<DegradedSource> = runs
            .iter()
            .filter_map(|run| match &run.outcome {
                SourceOutcome::Degraded { reason, .. } => Some(DegradedSource {
                    source: run.source,
                    industry: run.industry.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        if records.is_empty() && !cancelled {
            self.set_phase(ScanPhase::Finalized);
            tracing::error!(%run_id, attempted = runs.len(), "scan collected no data");
            return Err(ScanError::NoDataCollected {
                attempted: runs.len(),
                degraded: degraded
                    .iter()
                    .map(|d| format!("{}/{}: {}", d.source, d.industry, d.reason))
                    .collect(),
            });
        }

        let mut records_per_source: BTreeMap<Source, usize> = BTreeMap::new();
        for record in &records {
            *records_per_source.entry(record.source).or_default() += 1;
        }

        let merged = Deduplicator::merge(records);
        let raw_records = merged.input_records;
        let duplicates_merged = merged.duplicates_merged();
        let mut businesses = merged.businesses;

        if !cancelled {
            if let Some(verifier) = &self.verifier {
                self.set_phase(ScanPhase::Verifying);
                cancelled = verify_all(verifier, &mut businesses, cancel).await;
            }
        }

        let mut summary = ScanSummary {
            records_per_source,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            throttle_events: self.rate.throttle_events().saturating_sub(throttle_baseline),
            degraded,
            runs,
            raw_records,
            duplicates_merged,
            cancelled,
            ..ScanSummary::default()
        };
        for business in &businesses {
            match business.has_website {
                WebsiteStatus::Confirmed => summary.with_website += 1,
                WebsiteStatus::NoWebsite => summary.without_website += 1,
                WebsiteStatus::Unknown => summary.unknown += 1,
            }
        }

        self.set_phase(ScanPhase::Finalized);
        tracing::info!(
            %run_id,
            businesses = businesses.len(),
            raw_records = summary.raw_records,
            leads = summary.without_website,
            degraded = summary.degraded.len(),
            throttle_events = summary.throttle_events,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "scan finished"
        );

        Ok(ScanResult {
            run_id,
            started_at,
            businesses,
            summary,
        })
    }

    async fn scan_industry_sequential(
        &self,
        industry: &str,
        cancel: &CancellationToken,
    ) -> IndustryHarvest {
        let mut harvest = IndustryHarvest::default();
        let mut remaining = self.options.max_results_per_industry;

        for adapter in &self.adapters {
            if remaining == 0 {
                tracing::debug!(
                    source = %adapter.source(),
                    industry,
                    "industry cap reached, source skipped"
                );
                continue;
            }
            let scanned = self
                .scan_source(adapter.as_ref(), industry, remaining, cancel)
                .await;
            remaining = remaining.saturating_sub(scanned.records.len());
            let was_cancelled = scanned.cancelled();
            harvest.records.extend(scanned.records);
            harvest.runs.push(scanned.run);
            if was_cancelled {
                harvest.cancelled = true;
                break;
            }
        }
        harvest
    }

    /// Scans the industry's sources in parallel, each up to the full cap, then
    /// keeps the first `cap` records in source-priority order.
    async fn scan_industry_concurrent(
        &self,
        industry: &str,
        cancel: &CancellationToken,
    ) -> IndustryHarvest {
        let cap = self.options.max_results_per_industry;
        let results: Vec<SourceHarvest> = stream::iter(&self.adapters)
            .map(|adapter| self.scan_source(adapter.as_ref(), industry, cap, cancel))
            .buffered(self.options.max_concurrent_sources)
            .collect()
            .await;

        let mut harvest = IndustryHarvest::default();
        for mut scanned in results {
            let room = cap.saturating_sub(harvest.records.len());
            if scanned.records.len() > room {
                scanned.records.truncate(room);
                scanned.run.records = room;
            }
            harvest.cancelled |= scanned.cancelled();
            harvest.records.extend(scanned.records);
            harvest.runs.push(scanned.run);
        }
        harvest
    }

    async fn scan_source(
        &self,
        adapter: &dyn SourceAdapter,
        industry: &str,
        cap: usize,
        cancel: &CancellationToken,
    ) -> SourceHarvest {
        let source = adapter.source();
        self.set_phase(ScanPhase::Scanning {
            source,
            industry: industry.to_owned(),
        });
        tracing::info!(%source, industry, cap, "source started");

        let mut scan = adapter.search(&self.rate, self.options.retry, industry, cap);
        let mut records = Vec::new();

        loop {
            if cancel.is_cancelled() {
                scan.stop(SourceOutcome::Cancelled);
                break;
            }
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                item = scan.next() => Some(item),
            };
            match next {
                None => {
                    scan.stop(SourceOutcome::Cancelled);
                    break;
                }
                Some(None) => break,
                Some(Some(record)) => {
                    if cancel.is_cancelled() {
                        scan.stop(SourceOutcome::Cancelled);
                        break;
                    }
                    records.push(record);
                }
            }
        }

        let skipped = scan.skipped();
        let outcome = scan.into_outcome();
        tracing::info!(
            %source,
            industry,
            records = records.len(),
            skipped,
            outcome = ?outcome,
            "source finished"
        );

        SourceHarvest {
            run: SourceRun {
                source,
                industry: industry.to_owned(),
                records: records.len(),
                skipped,
                outcome,
            },
            records,
        }
    }
}

/// Verifies every business not already confirmed. Returns `true` if the run
/// was cancelled before all checks finished.
async fn verify_all(
    verifier: &WebsiteVerifier,
    businesses: &mut [MergedBusiness],
    cancel: &CancellationToken,
) -> bool {
    for business in businesses.iter_mut() {
        if cancel.is_cancelled() {
            return true;
        }
        if business.has_website == WebsiteStatus::Confirmed {
            continue;
        }
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            v = verifier.check(business.website_url.as_deref(), &business.name) => Some(v),
        };
        let Some(outcome) = outcome else {
            return true;
        };
        business.has_website = outcome.status();
        tracing::info!(
            business = %business.name,
            website = business.website_url.as_deref().unwrap_or("-"),
            outcome = ?business.has_website,
            "website verified"
        );
    }
    false
}
