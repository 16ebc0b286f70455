//! HTTP plumbing shared by the HTML directory adapters.

use std::time::Duration;

use leadscan_core::Source;
use reqwest::{header, Client, StatusCode};

use crate::error::ScraperError;

/// Builds the client used for directory page requests.
///
/// The `User-Agent` is set per request from the rotated identity pool.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] if the client cannot be constructed.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ScraperError> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// GETs an HTML page, mapping block and rate-limit responses to
/// [`ScraperError::Throttled`].
///
/// # Errors
///
/// - [`ScraperError::Throttled`] on HTTP 429, HTTP 403 or a bot-challenge body
/// - [`ScraperError::NotFound`] on HTTP 404
/// - [`ScraperError::UnexpectedStatus`] on any other non-2xx response
/// - [`ScraperError::Http`] on network failure
pub(crate) async fn fetch_html(
    client: &Client,
    url: &str,
    user_agent: &str,
    origin: Source,
) -> Result<String, ScraperError> {
    let response = client
        .get(url)
        .header(header::USER_AGENT, user_agent)
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .header(header::ACCEPT_LANGUAGE, "pl-PL,pl;q=0.9,en;q=0.8")
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let reason = match retry_after {
            Some(secs) => format!("HTTP 429 (retry-after {secs})"),
            None => "HTTP 429".to_owned(),
        };
        return Err(ScraperError::Throttled { origin, reason });
    }
    if status == StatusCode::FORBIDDEN {
        return Err(ScraperError::Throttled {
            origin,
            reason: "HTTP 403 (blocked)".to_owned(),
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }
    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    let body = response.text().await?;
    if looks_like_bot_challenge(&body) {
        return Err(ScraperError::Throttled {
            origin,
            reason: "bot challenge page".to_owned(),
        });
    }
    Ok(body)
}

pub(crate) fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");
    let has_human_check = lowered.contains("verify you are human");

    has_cloudflare_banner
        || has_challenge_platform
        || (has_just_a_moment && (has_cookie_gate || has_cf_chl || has_human_check))
}
