use std::time::Duration;

use async_trait::async_trait;

use crate::error::MetricsError;
use crate::models::ScrapedProtocol;

pub mod defillama_client;
pub use defillama_client::DefiLlamaClient;

/// Fixed delay between page fetches.
pub struct RequestPacer {
    delay: Duration,
}

impl RequestPacer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Source of scraped protocol metrics.
///
/// The pipeline only sees this seam; what sits behind it (live site, test
/// stub) is interchangeable.
#[async_trait]
pub trait ProtocolMetricsSource {
    async fn fetch_protocol(&self, protocol: &str) -> Result<ScrapedProtocol, MetricsError>;
}
