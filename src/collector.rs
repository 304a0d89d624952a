use tracing::{error, info};

use crate::api::{ProtocolMetricsSource, RequestPacer};
use crate::database::MetricStore;
use crate::error::MetricsError;
use crate::normalize;

/// Batch pipeline: fetch each protocol page, normalize the metrics, append
/// the record to the store.
pub struct MetricsCollector<S> {
    source: S,
    store: MetricStore,
    pacer: RequestPacer,
}

impl<S: ProtocolMetricsSource> MetricsCollector<S> {
    pub fn new(source: S, store: MetricStore, request_delay_ms: u64) -> Self {
        Self {
            source,
            store,
            pacer: RequestPacer::new(request_delay_ms),
        }
    }

    /// Run the pipeline for one protocol and return the assigned record id.
    pub async fn collect(&self, protocol: &str) -> Result<i64, MetricsError> {
        let item = self.source.fetch_protocol(protocol).await?;
        let record = normalize::normalize(&item);
        let id = self.store.append(&record).await?;
        info!("Stored record {} for {}", id, protocol);
        Ok(id)
    }

    /// Run the pipeline over a sequence of protocols.
    ///
    /// A failure for one protocol is logged with its key and the run moves
    /// on to the next; returns the number of records stored.
    pub async fn collect_all(&self, protocols: &[String]) -> usize {
        let mut stored = 0;
        for (i, protocol) in protocols.iter().enumerate() {
            if i > 0 {
                self.pacer.wait().await;
            }
            match self.collect(protocol).await {
                Ok(_) => stored += 1,
                Err(e) => error!("Failed to collect {}: {}", protocol, e),
            }
        }
        stored
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Hand the store back for the end-of-session close.
    pub fn into_store(self) -> MetricStore {
        self.store
    }
}
