//! Integration tests for the two HTML directory adapters.
//!
//! Each test stands up a `wiremock` server in place of the directory site and
//! drives a full `SourceScan` against it with zero politeness delays.

use std::sync::Arc;
use std::time::Duration;

use leadscan_core::Source;
use leadscan_scraper::{
    DelayRange, DirectoryAAdapter, DirectoryBAdapter, FailureKind, RateController, RateSettings,
    RetryPolicy, SourceAdapter, SourceOutcome,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quiet_rate() -> Arc<RateController> {
    Arc::new(RateController::new(RateSettings {
        request_delay: DelayRange::ZERO,
        page_delay: DelayRange::ZERO,
        cooldown: Duration::ZERO,
        max_cooldown: Duration::ZERO,
        identities: vec!["leadscan-test/0.1".to_owned()],
    }))
}

fn no_backoff(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_step: Duration::ZERO,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/html; charset=utf-8")
}

const DIRECTORY_A_PAGE_1: &str = r#"
<html><body>
  <div class="company-item">
    <h2><a href="/szczecin/kawiarnia_lipa">Kawiarnia Lipa</a></h2>
    <div class="address">Wały Chrobrego 1, 70-500 Szczecin</div>
    <a class="phone" href="tel:915551234">91 555 12 34</a>
    <a class="website" href="https://kawiarnia-lipa.pl">www</a>
  </div>
  <div class="company-item">
    <h2><a href="/szczecin/ziarno">Piekarnia Ziarno</a></h2>
    <span class="tel">600-100-200</span>
  </div>
  <a class="pagination-next" href="?p=2">Następna</a>
</body></html>
"#;

const DIRECTORY_A_PAGE_2: &str = r#"
<html><body>
  <div class="company-item">
    <h2><a href="/szczecin/fryzjer-ania">Fryzjer Ania</a></h2>
    <div class="address">ul. Krzywoustego 5, Szczecin</div>
    <a href="https://www.facebook.com/fryzjerania">Facebook</a>
  </div>
</body></html>
"#;

const DIRECTORY_B_PAGE: &str = r#"
<html><body>
  <div class="search-result-item">
    <h2><a href="/firma/hydraulik-kowalski">Hydraulik Kowalski</a></h2>
    <span class="address">ul. Jagiellońska 3</span>
    <span class="city">Szczecin</span>
    <a href="tel:+48600100200">600 100 200</a>
    <p>Strona: www.hydraulik-kowalski.pl</p>
  </div>
</body></html>
"#;

// ---------------------------------------------------------------------------
// Directory A
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directory_a_walks_all_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/szukaj"))
        .and(query_param("p", "1"))
        .respond_with(html(DIRECTORY_A_PAGE_1))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/szukaj"))
        .and(query_param("p", "2"))
        .respond_with(html(DIRECTORY_A_PAGE_2))
        .expect(1)
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryAAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(0), "kawiarnie", 50);
    let mut records = Vec::new();
    while let Some(record) = scan.next().await {
        records.push(record);
    }

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Kawiarnia Lipa", "Piekarnia Ziarno", "Fryzjer Ania"]);
    assert!(records.iter().all(|r| r.source == Source::DirectoryA));
    assert_eq!(records[0].phone.as_deref(), Some("+48915551234"));
    assert_eq!(records[0].website_url.as_deref(), Some("https://kawiarnia-lipa.pl/"));
    assert_eq!(
        records[2].facebook.as_deref(),
        Some("https://www.facebook.com/fryzjerania")
    );
    assert_eq!(scan.into_outcome(), SourceOutcome::Completed);
}

#[tokio::test]
async fn directory_a_cap_stops_before_second_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/szukaj"))
        .and(query_param("p", "1"))
        .respond_with(html(DIRECTORY_A_PAGE_1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/szukaj"))
        .and(query_param("p", "2"))
        .respond_with(html(DIRECTORY_A_PAGE_2))
        .expect(0)
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryAAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(0), "kawiarnie", 2);
    let mut count = 0;
    while scan.next().await.is_some() {
        count += 1;
    }

    assert_eq!(count, 2);
    assert_eq!(scan.into_outcome(), SourceOutcome::CapReached);
}

#[tokio::test]
async fn directory_a_server_errors_degrade_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/szukaj"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryAAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(3), "kawiarnie", 50);
    assert!(scan.next().await.is_none());

    match scan.into_outcome() {
        SourceOutcome::Degraded { kind, reason } => {
            assert_eq!(kind, FailureKind::Transient);
            assert!(reason.contains("503"), "reason was: {reason}");
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 4, "one attempt plus three retries");
}

// ---------------------------------------------------------------------------
// Directory B
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directory_b_parses_path_based_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/szukaj/hydraulik/szczecin"))
        .respond_with(html(DIRECTORY_B_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryBAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(0), "hydraulik", 50);
    let record = scan.next().await.expect("one record");
    assert!(scan.next().await.is_none());

    assert_eq!(record.name, "Hydraulik Kowalski");
    assert_eq!(record.source, Source::DirectoryB);
    assert_eq!(record.address.as_deref(), Some("ul. Jagiellońska 3, Szczecin"));
    assert_eq!(record.phone.as_deref(), Some("+48600100200"));
    assert_eq!(
        record.website_url.as_deref(),
        Some("http://www.hydraulik-kowalski.pl")
    );
    assert_eq!(scan.into_outcome(), SourceOutcome::Completed);
}

#[tokio::test]
async fn directory_b_rate_limit_degrades_after_one_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryBAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(3), "hydraulik", 50);
    assert!(scan.next().await.is_none());

    match scan.into_outcome() {
        SourceOutcome::Degraded { kind, .. } => assert_eq!(kind, FailureKind::Throttled),
        other => panic!("expected Degraded, got {other:?}"),
    }
    assert_eq!(rate.throttle_events(), 1);
    assert_eq!(rate.source_state(Source::DirectoryB).throttle_events, 1);
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2, "first try plus one try after cooldown");
}

#[tokio::test]
async fn directory_b_bot_challenge_counts_as_throttling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(
            "<html><head><title>Just a moment...</title></head>\
             <body><div id=\"challenge-form\" class=\"cf-chl-widget\">Checking your browser</div></body></html>",
        ))
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryBAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(0), "hydraulik", 50);
    assert!(scan.next().await.is_none());
    assert!(matches!(
        scan.into_outcome(),
        SourceOutcome::Degraded {
            kind: FailureKind::Throttled,
            ..
        }
    ));
    assert_eq!(rate.throttle_events(), 1);
}

#[tokio::test]
async fn directory_b_missing_page_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let rate = quiet_rate();
    let adapter = DirectoryBAdapter::new(
        &server.uri(),
        "Szczecin",
        Duration::from_secs(5),
        Arc::clone(&rate),
    )
    .expect("failed to build adapter");
    let adapter: &dyn SourceAdapter = &adapter;

    let mut scan = adapter.search(&rate, no_backoff(3), "hydraulik", 50);
    assert!(scan.next().await.is_none());
    assert!(matches!(
        scan.into_outcome(),
        SourceOutcome::Degraded {
            kind: FailureKind::Permanent,
            ..
        }
    ));
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1, "permanent failures are not retried");
}
