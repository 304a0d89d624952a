use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw field as produced by the fetch layer: either the text scraped off
/// the page, or an explicit marker that the page did not carry the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawField {
    Text(String),
    Missing,
}

impl RawField {
    /// Wrap an optional scraped value, trimming surrounding whitespace.
    pub fn from_scraped(value: Option<String>) -> Self {
        match value {
            Some(text) => RawField::Text(text.trim().to_string()),
            None => RawField::Missing,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawField::Text(text) => Some(text),
            RawField::Missing => None,
        }
    }
}

/// One protocol page worth of scraped metrics, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProtocol {
    pub protocol: String,
    pub market_cap: RawField,
    pub annual_revenue: RawField,
}

/// One stored observation of a protocol's published metrics.
///
/// `id` and `timestamp` are assigned by the store at append time; a record
/// is immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub protocol: String,
    /// Reserved: the scraped protocol pages do not publish a price.
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub annualized_revenue: Option<f64>,
    /// None means "not calculable", never "zero".
    pub pe_ratio: Option<f64>,
}

/// Aggregate store statistics for status output.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_records: i64,
    pub protocols: Vec<String>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub base_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub request_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "defillama_metrics.db".to_string()),
            base_url: std::env::var("DEFILLAMA_BASE_URL")
                .unwrap_or_else(|_| "https://defillama.com".to_string()),
            user_agent: std::env::var("USER_AGENT")
                .unwrap_or_else(|_| "defi-metrics/0.1".to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            request_delay_ms: std::env::var("REQUEST_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
        })
    }
}
