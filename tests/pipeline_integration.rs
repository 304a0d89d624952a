//! End-to-end pipeline tests: scraped input through normalization into the
//! store, with the HTTP client exercised against a local mock server.

use std::collections::HashMap;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use defi_metrics::api::{DefiLlamaClient, ProtocolMetricsSource};
use defi_metrics::collector::MetricsCollector;
use defi_metrics::database::MetricStore;
use defi_metrics::error::MetricsError;
use defi_metrics::models::{Config, RawField, ScrapedProtocol};
use defi_metrics::normalize;

const PAGE: &str = r#"
    <html><body><main>
        <div>
            <p><span>Market Cap</span><span>$1.5B</span></p>
            <details><summary><span>Annualized Revenue</span><span>$250M</span></summary></details>
        </div>
    </main></body></html>
"#;

fn scraped(protocol: &str, market_cap: &str, revenue: &str) -> ScrapedProtocol {
    ScrapedProtocol {
        protocol: protocol.to_string(),
        market_cap: RawField::Text(market_cap.to_string()),
        annual_revenue: RawField::Text(revenue.to_string()),
    }
}

async fn open_store(dir: &TempDir) -> MetricStore {
    let path = dir.path().join("metrics.db");
    MetricStore::connect(path.to_str().unwrap())
        .await
        .expect("failed to open store")
}

fn test_config(base_url: String) -> Config {
    Config {
        database_path: ":memory:".to_string(),
        base_url,
        user_agent: "defi-metrics-test/0.1".to_string(),
        http_timeout_secs: 5,
        request_delay_ms: 0,
    }
}

/// Canned source: serves preset items and fails for unknown protocols.
struct StubSource {
    items: HashMap<String, ScrapedProtocol>,
}

impl StubSource {
    fn new(items: Vec<ScrapedProtocol>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.protocol.clone(), item))
                .collect(),
        }
    }
}

#[async_trait]
impl ProtocolMetricsSource for StubSource {
    async fn fetch_protocol(&self, protocol: &str) -> Result<ScrapedProtocol, MetricsError> {
        self.items
            .get(protocol)
            .cloned()
            .ok_or_else(|| MetricsError::InvalidUrl {
                url: protocol.to_string(),
                source: url::ParseError::RelativeUrlWithoutBase,
            })
    }
}

#[test_log::test(tokio::test)]
async fn history_accumulates_and_latest_wins() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let first = normalize::normalize(&scraped("alpha", "$4B", "$1B"));
    let second = normalize::normalize(&scraped("alpha", "$6B", "$1B"));

    let first_id = store.append(&first).await.unwrap();
    let second_id = store.append(&second).await.unwrap();
    assert!(second_id > first_id);

    let all = store.read_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, Some(second_id));
    assert_eq!(all[0].market_cap, Some(6_000_000_000.0));
    assert_eq!(all[1].id, Some(first_id));

    let latest = store.latest_for_protocol("alpha").await.unwrap().unwrap();
    assert_eq!(latest.id, Some(second_id));
    assert_eq!(latest.pe_ratio, Some(6.0));

    store.close().await;
}

#[test_log::test(tokio::test)]
async fn collector_skips_failures_and_continues() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let source = StubSource::new(vec![
        scraped("alpha", "$4B", "$1B"),
        scraped("beta", "$2B", "0"),
    ]);
    let collector = MetricsCollector::new(source, store, 0);

    let protocols = vec![
        "alpha".to_string(),
        "down".to_string(),
        "beta".to_string(),
    ];
    let stored = collector.collect_all(&protocols).await;
    assert_eq!(stored, 2);

    let store = collector.into_store();
    let latest = store.latest_per_protocol().await.unwrap();
    assert_eq!(latest.len(), 2);

    // The zero-revenue protocol is stored with a null ratio.
    let beta = store.latest_for_protocol("beta").await.unwrap().unwrap();
    assert_eq!(beta.market_cap, Some(2_000_000_000.0));
    assert_eq!(beta.annualized_revenue, Some(0.0));
    assert_eq!(beta.pe_ratio, None);

    assert!(store.latest_for_protocol("down").await.unwrap().is_none());

    store.close().await;
}

#[test_log::test(tokio::test)]
async fn client_extracts_metrics_from_served_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/protocol/testproto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&server)
        .await;

    let client = DefiLlamaClient::new(&test_config(server.uri())).unwrap();
    let item = client.fetch_protocol("testproto").await.unwrap();

    assert_eq!(item.protocol, "testproto");
    assert_eq!(item.market_cap, RawField::Text("$1.5B".to_string()));
    assert_eq!(item.annual_revenue, RawField::Text("$250M".to_string()));
}

#[test_log::test(tokio::test)]
async fn client_marks_absent_values_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/protocol/bare"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let client = DefiLlamaClient::new(&test_config(server.uri())).unwrap();
    let item = client.fetch_protocol("bare").await.unwrap();

    assert_eq!(item.market_cap, RawField::Missing);
    assert_eq!(item.annual_revenue, RawField::Missing);

    // Missing fields normalize to an all-null record, never an error.
    let record = normalize::normalize(&item);
    assert_eq!(record.market_cap, None);
    assert_eq!(record.annualized_revenue, None);
    assert_eq!(record.pe_ratio, None);
}

#[test_log::test(tokio::test)]
async fn client_surfaces_http_errors() {
    let server = MockServer::start().await;
    // No mock mounted: the server answers 404.

    let client = DefiLlamaClient::new(&test_config(server.uri())).unwrap();
    let err = client.fetch_protocol("nothing").await.unwrap_err();
    assert!(matches!(err, MetricsError::Fetch { .. }));
}

#[test_log::test(tokio::test)]
async fn scrape_to_store_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/protocol/testproto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let client = DefiLlamaClient::new(&test_config(server.uri())).unwrap();
    let collector = MetricsCollector::new(client, store, 0);

    let id = collector.collect("testproto").await.unwrap();

    let stored = collector
        .store()
        .latest_for_protocol("testproto")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, Some(id));
    assert!(stored.timestamp.is_some());
    assert_eq!(stored.market_cap, Some(1_500_000_000.0));
    assert_eq!(stored.annualized_revenue, Some(250_000_000.0));
    assert_eq!(stored.pe_ratio, Some(6.0));

    collector.into_store().close().await;
}
