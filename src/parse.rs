//! Magnitude-string parsing.
//!
//! Pages publish values like `"$1.5B"` or `"250M"`: an optional currency
//! symbol, thousands separators, and a case-insensitive billion/million
//! suffix. Parsing is total; anything that does not survive conversion
//! comes back as an explicit non-value, never a panic or an error.

use crate::models::RawField;

const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;

/// Outcome of parsing one raw field.
#[derive(Debug, Clone, PartialEq)]
pub enum Magnitude {
    Parsed(f64),
    /// The fetch layer never found the value on the page.
    Missing,
    /// Text was present but did not convert; the original text is kept for
    /// logging.
    Unparseable(String),
}

impl Magnitude {
    pub fn value(&self) -> Option<f64> {
        match self {
            Magnitude::Parsed(v) => Some(*v),
            _ => None,
        }
    }
}

/// Strip the currency symbol and thousands separators from a raw value.
pub fn clean_display(raw: &str) -> String {
    raw.replace('$', "").replace(',', "").trim().to_string()
}

/// Convert a magnitude string to a number.
///
/// Suffix detection is substring-based and case-insensitive: a `b` anywhere
/// in the cleaned text means billions, otherwise an `m` means millions. The
/// suffix character is removed before the numeric parse.
pub fn parse_magnitude(raw: &str) -> Option<f64> {
    let cleaned = clean_display(raw).to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.contains('b') {
        cleaned
            .replace('b', "")
            .trim()
            .parse::<f64>()
            .ok()
            .map(|v| v * BILLION)
    } else if cleaned.contains('m') {
        cleaned
            .replace('m', "")
            .trim()
            .parse::<f64>()
            .ok()
            .map(|v| v * MILLION)
    } else {
        cleaned.parse::<f64>().ok()
    }
}

/// Parse a raw field into a tagged outcome.
pub fn parse_field(field: &RawField) -> Magnitude {
    match field {
        RawField::Missing => Magnitude::Missing,
        RawField::Text(text) => match parse_magnitude(text) {
            Some(value) => Magnitude::Parsed(value),
            None => Magnitude::Unparseable(text.clone()),
        },
    }
}
