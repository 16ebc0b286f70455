//! Google Places adapter: Text Search for listings, Place Details for
//! phone and website.
//!
//! Every HTTP call counts against the configured quota. Once the quota is
//! spent the adapter answers [`ScraperError::QuotaExhausted`] without touching
//! the network, which ends the scan cleanly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadscan_core::{BusinessRecord, Source};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::http::build_client;
use super::{ListingPage, PageCursor, RawListing, SourceAdapter};
use crate::error::{FailureKind, ScraperError};
use crate::normalize::{non_empty, normalize_phone};
use crate::parse_helpers::{is_own_website, SocialLinks};
use crate::rate_limit::RateController;

const ORIGIN: Source = Source::Maps;
const DETAILS_FIELDS: &str = "name,formatted_address,formatted_phone_number,website";

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<serde_json::Value>,
    next_page_token: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceSummary {
    place_id: Option<String>,
    name: Option<String>,
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceDetails>,
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceDetails {
    formatted_address: Option<String>,
    formatted_phone_number: Option<String>,
    website: Option<String>,
}

trait ApiStatus {
    fn status(&self) -> &str;
    fn error_message(&self) -> Option<&str>;
}

impl ApiStatus for TextSearchResponse {
    fn status(&self) -> &str {
        &self.status
    }
    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl ApiStatus for DetailsResponse {
    fn status(&self) -> &str {
        &self.status
    }
    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Maps a Places API `status` field to the scan's error taxonomy.
fn check_status(status: &str, message: Option<&str>) -> Result<(), ScraperError> {
    let message = message.unwrap_or_default().to_owned();
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(ScraperError::Throttled {
            origin: ORIGIN,
            reason: "OVER_QUERY_LIMIT".to_owned(),
        }),
        "UNKNOWN_ERROR" => Err(ScraperError::Malformed {
            origin: ORIGIN,
            reason: "UNKNOWN_ERROR".to_owned(),
        }),
        other => Err(ScraperError::Api {
            origin: ORIGIN,
            status: other.to_owned(),
            message,
        }),
    }
}

pub struct MapsAdapter {
    client: Client,
    base_url: String,
    city: String,
    api_key: Option<String>,
    quota: u32,
    used: AtomicU32,
    rate: Arc<RateController>,
}

impl MapsAdapter {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        city: &str,
        api_key: Option<String>,
        quota: u32,
        timeout: Duration,
        rate: Arc<RateController>,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            city: city.to_owned(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            quota,
            used: AtomicU32::new(0),
            rate,
        })
    }

    /// API calls made so far (Text Search and Place Details combined).
    #[must_use]
    pub fn requests_used(&self) -> u32 {
        self.used.load(Ordering::Relaxed)
    }

    fn api_key(&self) -> Result<&str, ScraperError> {
        self.api_key
            .as_deref()
            .ok_or(ScraperError::MissingCredential { origin: ORIGIN })
    }

    fn consume_quota(&self) -> Result<(), ScraperError> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.quota).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| ScraperError::QuotaExhausted {
                origin: ORIGIN,
                limit: self.quota,
            })
    }

    async fn get_json<T>(&self, url: &str, context: &str) -> Result<T, ScraperError>
    where
        T: DeserializeOwned + ApiStatus,
    {
        self.consume_quota()?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::Http(e.without_url()))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::Throttled {
                origin: ORIGIN,
                reason: "HTTP 429".to_owned(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact_key(url),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::Http(e.without_url()))?;
        let parsed: T = serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
            context: context.to_owned(),
            source,
        })?;
        check_status(parsed.status(), parsed.error_message())?;
        Ok(parsed)
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ScraperError> {
        let url = format!(
            "{}/maps/api/place/details/json?place_id={}&fields={DETAILS_FIELDS}&language=pl&key={}",
            self.base_url,
            utf8_percent_encode(place_id, NON_ALPHANUMERIC),
            utf8_percent_encode(self.api_key()?, NON_ALPHANUMERIC),
        );
        let response: DetailsResponse = self.get_json(&url, "place details").await?;
        Ok(response.result.unwrap_or_default())
    }
}

/// Strips the API key from URLs that end up in error messages and logs.
fn redact_key(url: &str) -> String {
    match url.find("key=") {
        Some(idx) => {
            let rest = &url[idx..];
            let end = rest.find('&').map_or(url.len(), |i| idx + i);
            format!("{}key=[redacted]{}", &url[..idx], &url[end..])
        }
        None => url.to_owned(),
    }
}

#[async_trait]
impl SourceAdapter for MapsAdapter {
    fn source(&self) -> Source {
        ORIGIN
    }

    async fn fetch_page(
        &self,
        industry: &str,
        cursor: &PageCursor,
    ) -> Result<ListingPage, ScraperError> {
        let key = self.api_key()?;
        let query = format!("{industry} {}", self.city);
        let mut url = format!(
            "{}/maps/api/place/textsearch/json?query={}&language=pl&key={}",
            self.base_url,
            utf8_percent_encode(&query, NON_ALPHANUMERIC),
            utf8_percent_encode(key, NON_ALPHANUMERIC),
        );
        if let PageCursor::Token(token) = cursor {
            url.push_str("&pagetoken=");
            url.push_str(&utf8_percent_encode(token, NON_ALPHANUMERIC).to_string());
        }

        let response: TextSearchResponse = self.get_json(&url, "text search").await?;
        let listings: Vec<RawListing> = response.results.into_iter().map(RawListing::Json).collect();
        let next = response
            .next_page_token
            .filter(|t| !t.is_empty())
            .map(PageCursor::Token);
        Ok(ListingPage { listings, next })
    }

    async fn parse_listing(
        &self,
        raw: RawListing,
        industry: &str,
    ) -> Result<BusinessRecord, ScraperError> {
        let RawListing::Json(value) = raw else {
            return Err(ScraperError::Parse {
                origin: ORIGIN,
                reason: "expected a JSON listing".to_owned(),
            });
        };
        let summary: PlaceSummary =
            serde_json::from_value(value).map_err(|e| ScraperError::Parse {
                origin: ORIGIN,
                reason: e.to_string(),
            })?;
        let name = summary.name.unwrap_or_default();
        let mut record = BusinessRecord::new(&name, industry, ORIGIN).map_err(|e| {
            ScraperError::Parse {
                origin: ORIGIN,
                reason: e.to_string(),
            }
        })?;
        record.address = summary.formatted_address.as_deref().and_then(non_empty);

        let Some(place_id) = summary.place_id else {
            return Ok(record);
        };

        match self.place_details(&place_id).await {
            Ok(details) => apply_details(&mut record, details),
            Err(err @ ScraperError::QuotaExhausted { .. }) => return Err(err),
            Err(err) if err.kind() == FailureKind::Throttled => {
                self.rate.on_throttled(ORIGIN);
                tracing::warn!(
                    source = %ORIGIN,
                    place = %record.name,
                    error = %err,
                    "place details throttled, keeping basic listing"
                );
            }
            Err(err) => {
                tracing::warn!(
                    source = %ORIGIN,
                    place = %record.name,
                    error = %err,
                    "place details failed, keeping basic listing"
                );
            }
        }
        Ok(record)
    }
}

fn apply_details(record: &mut BusinessRecord, details: PlaceDetails) {
    if record.address.is_none() {
        record.address = details.formatted_address.as_deref().and_then(non_empty);
    }
    record.phone = details
        .formatted_phone_number
        .as_deref()
        .and_then(normalize_phone);

    if let Some(website) = details.website.as_deref().and_then(non_empty) {
        if is_own_website(&website) {
            record.website_url = Some(website);
        } else {
            let mut social = SocialLinks::default();
            social.offer(&website);
            record.facebook = social.facebook;
            record.instagram = social.instagram;
            record.linkedin = social.linkedin;
        }
    }
}
