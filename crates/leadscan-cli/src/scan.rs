//! `scan` command: builds the orchestrator from config, runs it until done or
//! interrupted, and prints the result as JSON.

use chrono::{DateTime, Utc};
use clap::Args;
use leadscan_core::{MergedBusiness, ScanConfig, Source};
use leadscan_scraper::{ScanOrchestrator, ScanResult, ScanSummary};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MAX_CONCURRENCY: usize = 3;

/// Flags override the matching `LEADSCAN_*` environment settings.
#[derive(Debug, Args)]
pub(crate) struct ScanArgs {
    /// Industries to scan, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub industries: Option<Vec<String>>,

    /// Sources to query, comma separated (maps, directory_a, directory_b).
    #[arg(long, value_delimiter = ',', value_parser = parse_source)]
    pub sources: Option<Vec<Source>>,

    /// City to search in.
    #[arg(long)]
    pub city: Option<String>,

    /// Result cap per industry, shared by all sources.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Skip website verification; every business stays `unknown`.
    #[arg(long)]
    pub no_verify: bool,

    /// Print every business instead of leads only.
    #[arg(long)]
    pub all: bool,

    /// Sources of one industry scanned in parallel (1-3).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

fn parse_source(raw: &str) -> Result<Source, String> {
    raw.parse::<Source>().map_err(|e| e.to_string())
}

impl ScanArgs {
    /// Folds the flags into `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag value is out of range or empty.
    pub(crate) fn apply(&self, config: &mut ScanConfig) -> anyhow::Result<()> {
        if let Some(industries) = &self.industries {
            let industries: Vec<String> = industries
                .iter()
                .map(|i| i.trim().to_owned())
                .filter(|i| !i.is_empty())
                .collect();
            if industries.is_empty() {
                anyhow::bail!("--industries must name at least one industry");
            }
            config.industries = industries;
        }
        if let Some(sources) = &self.sources {
            if sources.is_empty() {
                anyhow::bail!("--sources must name at least one source");
            }
            config.sources.clone_from(sources);
        }
        if let Some(city) = &self.city {
            let city = city.trim();
            if city.is_empty() {
                anyhow::bail!("--city must be non-empty");
            }
            city.clone_into(&mut config.city);
        }
        if let Some(max_results) = self.max_results {
            if max_results == 0 {
                anyhow::bail!("--max-results must be positive");
            }
            config.max_results_per_industry = max_results;
        }
        if let Some(concurrency) = self.concurrency {
            if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
                anyhow::bail!("--concurrency must be between 1 and {MAX_CONCURRENCY}");
            }
            config.max_concurrent_sources = concurrency;
        }
        if self.no_verify {
            config.verify_websites = false;
        }
        Ok(())
    }
}

/// What goes to stdout: the full summary plus either every business or
/// leads only.
#[derive(Debug, Serialize)]
struct Report<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    businesses: Vec<&'a MergedBusiness>,
    summary: &'a ScanSummary,
}

impl<'a> Report<'a> {
    fn new(result: &'a ScanResult, all: bool) -> Self {
        let businesses = if all {
            result.businesses.iter().collect()
        } else {
            result.leads().collect()
        };
        Self {
            run_id: result.run_id,
            started_at: result.started_at,
            businesses,
            summary: &result.summary,
        }
    }
}

/// Runs one scan. Ctrl-C cancels it; the partial result is still printed.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built, if the scan collected
/// no data at all, or if the result cannot be written.
pub(crate) async fn run_scan(config: &ScanConfig, all: bool) -> anyhow::Result<()> {
    tracing::debug!(config = ?config, "scan configuration");
    let orchestrator = ScanOrchestrator::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping scan and keeping partial results");
            on_interrupt.cancel();
        }
    });

    let result = orchestrator.run(&cancel).await?;
    let report = Report::new(&result, all);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
