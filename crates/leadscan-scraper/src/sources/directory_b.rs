//! PKT directory adapter (HTML search pages).

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use leadscan_core::{BusinessRecord, Source};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use scraper::{Html, Selector};

use super::http::{build_client, fetch_html};
use super::markup::{element_text, first_text, listing_fragments, scan_contacts};
use super::{ListingPage, PageCursor, RawListing, SourceAdapter};
use crate::error::ScraperError;
use crate::normalize::{clean_text, normalize_phone};
use crate::parse_helpers::{absolute_url, extract_bare_website, host_of, is_own_website};
use crate::rate_limit::RateController;

const ORIGIN: Source = Source::DirectoryB;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static LISTING: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "div.search-result-item, article.company, div.result-item, li.search-result, div[data-id]",
    )
});
static LISTING_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| selector("div.company-box, div.firm-item"));
static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| {
    selector("a.next, a[rel='next'], li.pagination-next a, a.pagination__next")
});
static NAME: LazyLock<Selector> = LazyLock::new(|| {
    selector("h2 a, h3 a, .company-name, .firm-name, a.title, .name a")
});
static PROFILE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href*='/firma/']"));
static ADDRESS: LazyLock<Selector> =
    LazyLock::new(|| selector(".address, .location, .firma-address, span.street"));
static CITY: LazyLock<Selector> = LazyLock::new(|| selector(".city, .miasto"));
static PHONE: LazyLock<Selector> =
    LazyLock::new(|| selector(".phone, .tel, .telefon, a[href^='tel:']"));
static WEBSITE: LazyLock<Selector> = LazyLock::new(|| {
    selector("a.www, a.website, a[target='_blank'][href^='http']")
});

pub struct DirectoryBAdapter {
    client: Client,
    base_url: String,
    city: String,
    rate: Arc<RateController>,
}

impl DirectoryBAdapter {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        city: &str,
        timeout: Duration,
        rate: Arc<RateController>,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            city: city.to_lowercase(),
            rate,
        })
    }

    fn search_url(&self, industry: &str, page: u32) -> String {
        let industry = utf8_percent_encode(industry, NON_ALPHANUMERIC);
        let city = utf8_percent_encode(&self.city, NON_ALPHANUMERIC);
        if page <= 1 {
            format!("{}/szukaj/{industry}/{city}", self.base_url)
        } else {
            format!("{}/szukaj/{industry}/{city}/strona/{page}", self.base_url)
        }
    }
}

#[async_trait]
impl SourceAdapter for DirectoryBAdapter {
    fn source(&self) -> Source {
        ORIGIN
    }

    async fn fetch_page(
        &self,
        industry: &str,
        cursor: &PageCursor,
    ) -> Result<ListingPage, ScraperError> {
        let PageCursor::Page(page) = cursor else {
            return Err(ScraperError::Malformed {
                origin: ORIGIN,
                reason: format!("unsupported cursor {cursor:?}"),
            });
        };
        let url = self.search_url(industry, *page);
        let html = fetch_html(&self.client, &url, self.rate.rotate_identity(), ORIGIN).await?;
        Ok(parse_search_page(&html, *page))
    }

    async fn parse_listing(
        &self,
        raw: RawListing,
        industry: &str,
    ) -> Result<BusinessRecord, ScraperError> {
        let RawListing::Html(fragment) = raw else {
            return Err(ScraperError::Parse {
                origin: ORIGIN,
                reason: "expected an HTML listing".to_owned(),
            });
        };
        parse_company(&fragment, industry, &self.base_url)
    }
}

pub(crate) fn parse_search_page(html: &str, page: u32) -> ListingPage {
    let document = Html::parse_document(html);
    let listings: Vec<RawListing> = listing_fragments(&document, &[&LISTING, &LISTING_FALLBACK])
        .into_iter()
        .map(RawListing::Html)
        .collect();
    let has_next = document.select(&NEXT_PAGE).next().is_some();
    let next = (has_next && !listings.is_empty()).then(|| PageCursor::Page(page + 1));
    ListingPage { listings, next }
}

pub(crate) fn parse_company(
    fragment: &str,
    industry: &str,
    base_url: &str,
) -> Result<BusinessRecord, ScraperError> {
    let html = Html::parse_fragment(fragment);
    let root = html.root_element();

    let name = first_text(root, &NAME)
        .or_else(|| first_text(root, &PROFILE_LINK))
        .ok_or_else(|| ScraperError::Parse {
            origin: ORIGIN,
            reason: "listing has no company name".to_owned(),
        })?;

    let mut record = BusinessRecord::new(&name, industry, ORIGIN).map_err(|e| {
        ScraperError::Parse {
            origin: ORIGIN,
            reason: e.to_string(),
        }
    })?;

    record.address = match (first_text(root, &ADDRESS), first_text(root, &CITY)) {
        (Some(street), Some(city)) if !street.to_lowercase().contains(&city.to_lowercase()) => {
            Some(format!("{street}, {city}"))
        }
        (Some(street), _) => Some(street),
        (None, city) => city,
    };

    let contacts = scan_contacts(root);
    record.phone = root
        .select(&PHONE)
        .find_map(|el| {
            let raw = el
                .value()
                .attr("href")
                .map_or_else(|| element_text(el), str::to_owned);
            normalize_phone(raw.trim().trim_start_matches("tel:"))
        })
        .or(contacts.phone);
    record.email = contacts.email;
    record.facebook = contacts.social.facebook;
    record.instagram = contacts.social.instagram;
    record.linkedin = contacts.social.linkedin;

    let directory_host = host_of(base_url);
    record.website_url = root
        .select(&WEBSITE)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| absolute_url(base_url, href))
        .find(|url| is_own_website(url) && host_of(url) != directory_host)
        .or_else(|| {
            extract_bare_website(&clean_text(&root.text().collect::<Vec<_>>().join(" ")))
                .filter(|url| is_own_website(url))
        });

    Ok(record)
}
