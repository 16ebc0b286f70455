//! Website presence verification.
//!
//! A supplied URL gets a DNS lookup and a bounded GET. A business without a
//! URL gets a DNS-only probe of domains guessed from its name. Every network
//! step is bounded by the configured timeout, and an `Unknown` URL probe is
//! retried once before settling.

use std::sync::LazyLock;
use std::time::Duration;

use leadscan_core::{ScanConfig, WebsiteStatus, DEFAULT_USER_AGENTS};
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::error::ScraperError;
use crate::normalize::{fold, non_empty};
use crate::parse_helpers::is_own_website;

/// Fewer visible characters than this and a page counts as a placeholder.
const MIN_VISIBLE_TEXT: usize = 100;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid script regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style>").expect("valid style regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static PARKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)domain\s+(is\s+)?(for\s+sale|parked)|buy\s+this\s+domain|this\s+domain\s+(may\s+be|is)\s+for\s+sale|parking\s+domen|domena\s+(jest\s+)?(na\s+sprzeda|zaparkowana)|kup\s+t(ę|e)\s+domen|strona\s+w\s+budowie|under\s+construction|coming\s+soon|lorem\s+ipsum|default\s+web\s+page|welcome\s+to\s+nginx|it\s+works!",
    )
    .expect("valid parked-domain regex")
});

/// Result of verifying one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "url", rename_all = "snake_case")]
pub enum Verification {
    /// The site answered; carries the probed URL.
    Confirmed(String),
    NoWebsite,
    Unknown,
}

impl Verification {
    #[must_use]
    pub fn status(&self) -> WebsiteStatus {
        match self {
            Verification::Confirmed(_) => WebsiteStatus::Confirmed,
            Verification::NoWebsite => WebsiteStatus::NoWebsite,
            Verification::Unknown => WebsiteStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Bound for each DNS lookup and each GET.
    pub timeout: Duration,
    /// TLDs tried for name-derived domain guesses, without leading dot.
    pub guess_tlds: Vec<String>,
    /// Classify placeholder and for-sale pages as `NoWebsite`.
    pub detect_parked_domains: bool,
    pub user_agent: String,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            guess_tlds: vec!["pl".to_owned(), "com.pl".to_owned(), "com".to_owned()],
            detect_parked_domains: false,
            user_agent: DEFAULT_USER_AGENTS[0].to_owned(),
        }
    }
}

impl VerifierSettings {
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.verify_timeout_secs),
            guess_tlds: config.domain_guess_tlds.clone(),
            detect_parked_domains: config.detect_parked_domains,
            user_agent: config
                .user_agents
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_owned()),
        }
    }
}

enum Resolution {
    Resolved,
    Failed,
    TimedOut,
}

pub struct WebsiteVerifier {
    client: Client,
    settings: VerifierSettings,
}

impl WebsiteVerifier {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: VerifierSettings) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, settings })
    }

    /// Decides whether a business has a working website of its own.
    ///
    /// With no candidate URL the business name drives a domain-guess probe:
    /// `NoWebsite` only if every guess fails to resolve, otherwise `Unknown`.
    pub async fn check(&self, candidate: Option<&str>, business_name: &str) -> Verification {
        let outcome = match candidate.and_then(non_empty) {
            Some(url) => self.check_url(&url).await,
            None => self.check_guesses(business_name).await,
        };
        tracing::debug!(
            business = business_name,
            candidate = candidate.unwrap_or("-"),
            outcome = ?outcome,
            "website verification"
        );
        outcome
    }

    /// Probes `url`, retrying once if the first answer is `Unknown`.
    pub async fn check_url(&self, url: &str) -> Verification {
        let first = self.probe(url).await;
        if first != Verification::Unknown {
            return first;
        }
        tracing::debug!(url, "inconclusive probe, retrying once");
        self.probe(url).await
    }

    async fn probe(&self, raw: &str) -> Verification {
        let url = with_scheme(raw);
        let Ok(parsed) = Url::parse(&url) else {
            return Verification::NoWebsite;
        };
        if !is_own_website(&url) {
            return Verification::NoWebsite;
        }
        let Some(host) = parsed.host_str() else {
            return Verification::NoWebsite;
        };
        let port = parsed.port_or_known_default().unwrap_or(80);

        match self.resolve(host, port).await {
            Resolution::Failed => return Verification::NoWebsite,
            Resolution::TimedOut => return Verification::Unknown,
            Resolution::Resolved => {}
        }

        let response = match self.client.get(parsed.clone()).send().await {
            Ok(response) => response,
            Err(err) => return classify_request_error(&err),
        };

        let status = response.status();
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            return Verification::Unknown;
        }
        if status.is_client_error() {
            return Verification::NoWebsite;
        }
        if !is_own_website(response.url().as_str()) {
            // redirected onto a social profile or directory page
            return Verification::NoWebsite;
        }

        if self.settings.detect_parked_domains && status.is_success() {
            match response.text().await {
                Ok(body) if looks_parked(&body) => return Verification::NoWebsite,
                Ok(_) => {}
                Err(err) => return classify_request_error(&err),
            }
        }
        Verification::Confirmed(parsed.to_string())
    }

    async fn check_guesses(&self, business_name: &str) -> Verification {
        let guesses = domain_guesses(business_name, &self.settings.guess_tlds);
        if guesses.is_empty() {
            return Verification::Unknown;
        }
        for domain in &guesses {
            match self.resolve(domain, 80).await {
                Resolution::Failed => {}
                Resolution::Resolved | Resolution::TimedOut => {
                    tracing::debug!(
                        business = business_name,
                        domain,
                        "guessed domain answers, ownership unclear"
                    );
                    return Verification::Unknown;
                }
            }
        }
        Verification::NoWebsite
    }

    async fn resolve(&self, host: &str, port: u16) -> Resolution {
        // RFC 6761: never resolves
        if host.ends_with(".invalid") || host == "invalid" {
            return Resolution::Failed;
        }
        match tokio::time::timeout(self.settings.timeout, tokio::net::lookup_host((host, port)))
            .await
        {
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    Resolution::Resolved
                } else {
                    Resolution::Failed
                }
            }
            Ok(Err(_)) => Resolution::Failed,
            Err(_) => Resolution::TimedOut,
        }
    }
}

fn with_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("http://{}", trimmed.trim_start_matches("//"))
    }
}

fn classify_request_error(err: &reqwest::Error) -> Verification {
    if err.is_timeout() {
        return Verification::Unknown;
    }
    if is_connection_refused(err) {
        return Verification::NoWebsite;
    }
    Verification::Unknown
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

/// Candidate domains for a business without a listed website: the folded
/// name joined and hyphenated, under each TLD.
#[must_use]
pub fn domain_guesses(business_name: &str, tlds: &[String]) -> Vec<String> {
    let folded = fold(business_name);
    let words: Vec<&str> = folded
        .split(' ')
        .filter(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_alphanumeric()))
        .collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut slugs = vec![words.concat()];
    if words.len() > 1 {
        slugs.push(words.join("-"));
    }

    let mut guesses = Vec::with_capacity(slugs.len() * tlds.len());
    for tld in tlds {
        for slug in &slugs {
            // DNS labels are at most 63 octets
            if slug.len() <= 63 {
                guesses.push(format!("{slug}.{tld}"));
            }
        }
    }
    guesses
}

/// `true` for for-sale, parking and placeholder pages.
#[must_use]
pub fn looks_parked(body: &str) -> bool {
    if PARKED_RE.is_match(body) {
        return true;
    }
    let without_scripts = SCRIPT_RE.replace_all(body, " ");
    let without_styles = STYLE_RE.replace_all(&without_scripts, " ");
    let text = TAG_RE.replace_all(&without_styles, " ");
    let visible: usize = text.split_whitespace().map(|w| w.chars().count()).sum();
    visible < MIN_VISIBLE_TEXT
}
