pub mod dedup;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod parse_helpers;
pub mod rate_limit;
pub mod sources;
pub mod verifier;

pub use dedup::{Deduplicator, MergeOutcome};
pub use error::{FailureKind, ScanError, ScraperError};
pub use normalize::NormalizedKey;
pub use orchestrator::{
    DegradedSource, ScanOptions, ScanOrchestrator, ScanPhase, ScanResult, ScanSummary, SourceRun,
};
pub use rate_limit::{DelayRange, RateController, RateSettings, RetryPolicy, SourceRateState};
pub use sources::{
    DirectoryAAdapter, DirectoryBAdapter, ListingPage, MapsAdapter, PageCursor, RawListing,
    SourceAdapter, SourceOutcome, SourceScan,
};
pub use verifier::{Verification, VerifierSettings, WebsiteVerifier};
