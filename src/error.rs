use thiserror::Error;

/// Failure taxonomy for the scrape-and-store pipeline.
///
/// Parse failures are deliberately not represented here: an unparseable
/// magnitude degrades to a null field (`parse::Magnitude::Unparseable`)
/// instead of aborting the record.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("protocol key must not be empty")]
    EmptyProtocolKey,
}
