use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::ProtocolMetricsSource;
use crate::error::MetricsError;
use crate::models::{Config, RawField, ScrapedProtocol};

/// Labels of the two metrics extracted from a protocol page, matched
/// case-insensitively against the label span.
const MARKET_CAP_LABEL: &str = "market cap";
const ANNUAL_REVENUE_LABEL: &str = "annualized revenue";

/// Client for DeFiLlama protocol pages.
pub struct DefiLlamaClient {
    client: Client,
    base_url: Url,
}

impl DefiLlamaClient {
    pub fn new(config: &Config) -> Result<Self, MetricsError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| MetricsError::Fetch {
                url: config.base_url.clone(),
                source,
            })?;

        let base_url =
            Url::parse(&config.base_url).map_err(|source| MetricsError::InvalidUrl {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self { client, base_url })
    }

    fn protocol_url(&self, protocol: &str) -> Result<Url, MetricsError> {
        self.base_url
            .join(&format!("protocol/{}", protocol))
            .map_err(|source| MetricsError::InvalidUrl {
                url: format!("{}protocol/{}", self.base_url, protocol),
                source,
            })
    }
}

#[async_trait]
impl ProtocolMetricsSource for DefiLlamaClient {
    async fn fetch_protocol(&self, protocol: &str) -> Result<ScrapedProtocol, MetricsError> {
        let url = self.protocol_url(protocol)?;
        debug!("Fetching {}", url);

        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| MetricsError::Fetch {
                url: url.to_string(),
                source,
            })?
            .text()
            .await
            .map_err(|source| MetricsError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let market_cap = extract_labeled_value(&body, MARKET_CAP_LABEL);
        let annual_revenue = extract_labeled_value(&body, ANNUAL_REVENUE_LABEL);

        if market_cap.is_none() {
            warn!("Market cap not found on page for {}", protocol);
        }
        if annual_revenue.is_none() {
            warn!("Annualized revenue not found on page for {}", protocol);
        }

        Ok(ScrapedProtocol {
            protocol: protocol.to_string(),
            market_cap: RawField::from_scraped(market_cap),
            annual_revenue: RawField::from_scraped(annual_revenue),
        })
    }
}

/// Pull the value span that sits next to a metric label.
///
/// Protocol pages render each headline metric as a label span followed by a
/// value span inside the same `p` or `summary` element; the label text is
/// matched case-insensitively instead of relying on element positions.
pub fn extract_labeled_value(html: &str, label: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let block_selector = Selector::parse("p, summary").ok()?;
    let span_selector = Selector::parse("span").ok()?;

    for element in document.select(&block_selector) {
        let spans: Vec<_> = element.select(&span_selector).collect();
        if spans.len() < 2 {
            continue;
        }

        let label_text: String = spans[0].text().collect();
        if !label_text.trim().to_lowercase().contains(label) {
            continue;
        }

        let value: String = spans[1].text().collect();
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><main>
            <div>
                <p><span>Market Cap</span><span>$1.5B</span></p>
                <details><summary><span>Fees (annualized)</span><span>$90M</span></summary></details>
                <details><summary><span>Annualized Revenue</span><span>$250M</span></summary></details>
            </div>
        </main></body></html>
    "#;

    #[test]
    fn test_extracts_labeled_values() {
        assert_eq!(
            extract_labeled_value(PAGE, MARKET_CAP_LABEL),
            Some("$1.5B".to_string())
        );
        assert_eq!(
            extract_labeled_value(PAGE, ANNUAL_REVENUE_LABEL),
            Some("$250M".to_string())
        );
    }

    #[test]
    fn test_missing_label_yields_none() {
        assert_eq!(extract_labeled_value(PAGE, "treasury"), None);
        assert_eq!(extract_labeled_value("<html></html>", MARKET_CAP_LABEL), None);
    }

    #[test]
    fn test_empty_value_span_yields_none() {
        let page = "<p><span>Market Cap</span><span>  </span></p>";
        assert_eq!(extract_labeled_value(page, MARKET_CAP_LABEL), None);
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let page = "<p><span>MARKET CAP</span><span>$2B</span></p>";
        assert_eq!(
            extract_labeled_value(page, MARKET_CAP_LABEL),
            Some("$2B".to_string())
        );
    }
}
