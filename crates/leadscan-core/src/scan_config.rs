use crate::Source;

/// Industries scanned when `LEADSCAN_INDUSTRIES` is not set.
pub const DEFAULT_INDUSTRIES: [&str; 18] = [
    "restauracje",
    "kawiarnie",
    "kancelarie prawne",
    "doradcy prawni",
    "fryzjerzy",
    "salony kosmetyczne",
    "mechanicy samochodowi",
    "dentyści",
    "weterynarze",
    "piekarnie",
    "kwiaciarnie",
    "fotografowie",
    "biura rachunkowe",
    "agencje nieruchomości",
    "firmy sprzątające",
    "usługi remontowe",
    "elektrycy",
    "hydraulicy",
];

/// Client identities rotated between directory requests.
pub const DEFAULT_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Clone)]
pub struct ScanConfig {
    pub city: String,
    pub industries: Vec<String>,
    pub sources: Vec<Source>,
    pub max_results_per_industry: usize,
    pub request_delay_min_ms: u64,
    pub request_delay_max_ms: u64,
    pub page_delay_min_ms: u64,
    pub page_delay_max_ms: u64,
    pub throttle_cooldown_secs: u64,
    pub max_cooldown_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub verify_websites: bool,
    pub verify_timeout_secs: u64,
    pub detect_parked_domains: bool,
    pub domain_guess_tlds: Vec<String>,
    pub max_concurrent_sources: usize,
    pub user_agents: Vec<String>,
    pub maps_api_key: Option<String>,
    pub maps_quota: u32,
    pub directory_a_url: String,
    pub directory_b_url: String,
    pub maps_url: String,
    pub log_level: String,
}

impl ScanConfig {
    /// Returns the configured sources in scan (priority) order, without repeats.
    #[must_use]
    pub fn ordered_sources(&self) -> Vec<Source> {
        let mut sources = self.sources.clone();
        sources.sort_unstable();
        sources.dedup();
        sources
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("city", &self.city)
            .field("industries", &self.industries)
            .field("sources", &self.sources)
            .field("max_results_per_industry", &self.max_results_per_industry)
            .field("request_delay_min_ms", &self.request_delay_min_ms)
            .field("request_delay_max_ms", &self.request_delay_max_ms)
            .field("page_delay_min_ms", &self.page_delay_min_ms)
            .field("page_delay_max_ms", &self.page_delay_max_ms)
            .field("throttle_cooldown_secs", &self.throttle_cooldown_secs)
            .field("max_cooldown_secs", &self.max_cooldown_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("verify_websites", &self.verify_websites)
            .field("verify_timeout_secs", &self.verify_timeout_secs)
            .field("detect_parked_domains", &self.detect_parked_domains)
            .field("domain_guess_tlds", &self.domain_guess_tlds)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("user_agents", &self.user_agents.len())
            .field(
                "maps_api_key",
                &self.maps_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("maps_quota", &self.maps_quota)
            .field("directory_a_url", &self.directory_a_url)
            .field("directory_b_url", &self.directory_b_url)
            .field("maps_url", &self.maps_url)
            .field("log_level", &self.log_level)
            .finish()
    }
}
