//! Normalization of scraped metrics into storable records.
//!
//! The valuation ratio is derived from the original raw strings, before any
//! display cleaning touches them; the stored magnitudes go through cleaning
//! and conversion separately and degrade to null when they fail.

use tracing::debug;

use crate::models::{MetricRecord, RawField, ScrapedProtocol};
use crate::parse::{self, Magnitude};

/// Display sentinel for a ratio that was deliberately not computed.
pub const NOT_CALCULABLE: &str = "Not calculable";

/// Result of the valuation-ratio derivation.
///
/// `Calculable` carries the two-decimal display string; the stored numeric
/// form is re-parsed from it so storage and display agree.
#[derive(Debug, Clone, PartialEq)]
pub enum RatioOutcome {
    Calculable(String),
    NotCalculable,
}

impl RatioOutcome {
    /// Numeric form for storage; the sentinel stores as null.
    pub fn stored(&self) -> Option<f64> {
        match self {
            RatioOutcome::Calculable(text) => text.parse::<f64>().ok(),
            RatioOutcome::NotCalculable => None,
        }
    }

    pub fn display(&self) -> &str {
        match self {
            RatioOutcome::Calculable(text) => text,
            RatioOutcome::NotCalculable => NOT_CALCULABLE,
        }
    }
}

/// Derive the P/E-style ratio from the original raw fields.
///
/// Both fields must be present and parseable, market cap must be non-zero,
/// and revenue must be strictly positive (division guard); anything else
/// yields the sentinel.
pub fn compute_pe_ratio(market_cap: &RawField, annual_revenue: &RawField) -> RatioOutcome {
    let market_cap = match parse::parse_field(market_cap) {
        Magnitude::Parsed(value) => value,
        _ => return RatioOutcome::NotCalculable,
    };
    let revenue = match parse::parse_field(annual_revenue) {
        Magnitude::Parsed(value) => value,
        _ => return RatioOutcome::NotCalculable,
    };

    if market_cap != 0.0 && revenue > 0.0 {
        RatioOutcome::Calculable(format!("{:.2}", market_cap / revenue))
    } else {
        RatioOutcome::NotCalculable
    }
}

/// Turn one scraped item into a record ready for appending.
///
/// A malformed field never blocks the record; it is logged and stored as
/// null. The store assigns `id` and `timestamp` later.
pub fn normalize(item: &ScrapedProtocol) -> MetricRecord {
    let ratio = compute_pe_ratio(&item.market_cap, &item.annual_revenue);

    MetricRecord {
        id: None,
        timestamp: None,
        protocol: item.protocol.clone(),
        price: None,
        market_cap: cleaned_value(&item.market_cap, &item.protocol, "market_cap"),
        annualized_revenue: cleaned_value(&item.annual_revenue, &item.protocol, "annual_revenue"),
        pe_ratio: ratio.stored(),
    }
}

fn cleaned_value(field: &RawField, protocol: &str, name: &str) -> Option<f64> {
    let cleaned = match field {
        RawField::Text(text) => RawField::Text(parse::clean_display(text)),
        RawField::Missing => RawField::Missing,
    };

    match parse::parse_field(&cleaned) {
        Magnitude::Parsed(value) => Some(value),
        Magnitude::Missing => None,
        Magnitude::Unparseable(text) => {
            debug!("Field {} for {} did not parse ({:?}), storing null", name, protocol, text);
            None
        }
    }
}
