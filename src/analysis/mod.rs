//! Read-only analytics over a loaded metric history.
//!
//! Everything here is stateless: the functions take a slice of records as
//! returned by the store and never touch the database.

use crate::models::MetricRecord;

type FieldGetter = fn(&MetricRecord) -> Option<f64>;

const FIELDS: [(&str, FieldGetter); 4] = [
    ("price", |r: &MetricRecord| r.price),
    ("market_cap", |r: &MetricRecord| r.market_cap),
    ("annualized_revenue", |r: &MetricRecord| r.annualized_revenue),
    ("pe_ratio", |r: &MetricRecord| r.pe_ratio),
];

/// Missing-value tally for one field.
#[derive(Debug, Clone)]
pub struct FieldMissing {
    pub field: &'static str,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Missing-value report across the whole history.
#[derive(Debug, Clone)]
pub struct MissingValueReport {
    pub total_records: usize,
    pub fields: Vec<FieldMissing>,
}

pub fn missing_value_report(records: &[MetricRecord]) -> MissingValueReport {
    let total = records.len();
    let fields = FIELDS
        .iter()
        .map(|&(name, getter)| {
            let missing = records.iter().filter(|&r| getter(r).is_none()).count();
            let missing_pct = if total > 0 {
                missing as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            FieldMissing {
                field: name,
                missing,
                missing_pct,
            }
        })
        .collect();

    MissingValueReport {
        total_records: total,
        fields,
    }
}

/// Per-field deltas of one record against the previous observation of the
/// same protocol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    pub market_cap_change: Option<f64>,
    pub market_cap_pct_change: Option<f64>,
    pub annualized_revenue_change: Option<f64>,
    pub annualized_revenue_pct_change: Option<f64>,
    pub pe_ratio_change: Option<f64>,
    pub pe_ratio_pct_change: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    pub record: MetricRecord,
    pub changes: FieldChanges,
}

/// Order the history by protocol and time ascending, and pair every record
/// with deltas against the previous record of the same protocol.
///
/// The first observation of each protocol has no changes; a percentage
/// change is absent when the previous value is absent or zero.
pub fn with_changes(records: &[MetricRecord]) -> Vec<EnrichedRecord> {
    let mut sorted: Vec<MetricRecord> = records.to_vec();
    sorted.sort_by(|a, b| {
        a.protocol
            .cmp(&b.protocol)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.id.cmp(&b.id))
    });

    let mut enriched = Vec::with_capacity(sorted.len());
    for i in 0..sorted.len() {
        let changes = if i > 0 && sorted[i - 1].protocol == sorted[i].protocol {
            field_changes(&sorted[i], &sorted[i - 1])
        } else {
            FieldChanges::default()
        };
        enriched.push(EnrichedRecord {
            record: sorted[i].clone(),
            changes,
        });
    }

    enriched
}

fn field_changes(current: &MetricRecord, previous: &MetricRecord) -> FieldChanges {
    let (market_cap_change, market_cap_pct_change) = delta(current.market_cap, previous.market_cap);
    let (annualized_revenue_change, annualized_revenue_pct_change) =
        delta(current.annualized_revenue, previous.annualized_revenue);
    let (pe_ratio_change, pe_ratio_pct_change) = delta(current.pe_ratio, previous.pe_ratio);

    FieldChanges {
        market_cap_change,
        market_cap_pct_change,
        annualized_revenue_change,
        annualized_revenue_pct_change,
        pe_ratio_change,
        pe_ratio_pct_change,
    }
}

fn delta(current: Option<f64>, previous: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (current, previous) {
        (Some(cur), Some(prev)) => {
            let change = cur - prev;
            let pct = if prev != 0.0 {
                Some(change / prev * 100.0)
            } else {
                None
            };
            (Some(change), pct)
        }
        _ => (None, None),
    }
}

/// Summary statistics over the non-null values of one field.
#[derive(Debug, Clone)]
pub struct FieldSummary {
    pub field: &'static str,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_25: f64,
    pub median: f64,
    pub percentile_75: f64,
    pub volatility: f64,
}

/// Summarize one series of values; empty input has no summary.
pub fn summarize(field: &'static str, values: &[f64]) -> Option<FieldSummary> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let len = sorted.len();
    let min = sorted[0];
    let max = sorted[len - 1];
    let mean = sorted.iter().sum::<f64>() / len as f64;

    let median = if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    };

    let percentile_25_idx = (len as f64 * 0.25) as usize;
    let percentile_75_idx = (len as f64 * 0.75) as usize;
    let percentile_25 = sorted[percentile_25_idx.min(len - 1)];
    let percentile_75 = sorted[percentile_75_idx.min(len - 1)];

    let variance = sorted.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / len as f64;

    Some(FieldSummary {
        field,
        count: len,
        mean,
        min,
        max,
        percentile_25,
        median,
        percentile_75,
        volatility: variance.sqrt(),
    })
}

/// Summaries for every numeric field with at least one non-null value.
pub fn field_summaries(records: &[MetricRecord]) -> Vec<FieldSummary> {
    FIELDS
        .iter()
        .filter_map(|&(name, getter)| {
            let values: Vec<f64> = records.iter().filter_map(getter).collect();
            summarize(name, &values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(
        id: i64,
        minute: u32,
        protocol: &str,
        market_cap: Option<f64>,
        revenue: Option<f64>,
        pe: Option<f64>,
    ) -> MetricRecord {
        MetricRecord {
            id: Some(id),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()),
            protocol: protocol.to_string(),
            price: None,
            market_cap,
            annualized_revenue: revenue,
            pe_ratio: pe,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_missing_value_report() {
        let records = vec![
            record(1, 0, "alpha", Some(4e9), Some(1e9), Some(4.0)),
            record(2, 1, "alpha", None, Some(1e9), None),
        ];

        let report = missing_value_report(&records);
        assert_eq!(report.total_records, 2);

        let by_field: Vec<(&str, usize)> =
            report.fields.iter().map(|f| (f.field, f.missing)).collect();
        assert_eq!(
            by_field,
            vec![
                ("price", 2),
                ("market_cap", 1),
                ("annualized_revenue", 0),
                ("pe_ratio", 1)
            ]
        );
        assert!(approx(report.fields[1].missing_pct, 50.0));
    }

    #[test]
    fn test_missing_value_report_empty_history() {
        let report = missing_value_report(&[]);
        assert_eq!(report.total_records, 0);
        assert!(report.fields.iter().all(|f| f.missing == 0 && f.missing_pct == 0.0));
    }

    #[test]
    fn test_with_changes_first_record_per_protocol_has_none() {
        let records = vec![
            record(1, 0, "alpha", Some(4e9), Some(1e9), Some(4.0)),
            record(2, 1, "beta", Some(2e9), Some(1e9), Some(2.0)),
        ];

        let enriched = with_changes(&records);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].changes, FieldChanges::default());
        assert_eq!(enriched[1].changes, FieldChanges::default());
    }

    #[test]
    fn test_with_changes_deltas_within_protocol() {
        // Store order is newest-first; the analyzer re-sorts ascending.
        let records = vec![
            record(2, 1, "alpha", Some(6e9), Some(1e9), Some(6.0)),
            record(1, 0, "alpha", Some(4e9), Some(1e9), Some(4.0)),
        ];

        let enriched = with_changes(&records);
        assert_eq!(enriched[0].record.id, Some(1));
        assert_eq!(enriched[1].record.id, Some(2));

        let changes = &enriched[1].changes;
        assert!(approx(changes.market_cap_change.unwrap(), 2e9));
        assert!(approx(changes.market_cap_pct_change.unwrap(), 50.0));
        assert!(approx(changes.annualized_revenue_change.unwrap(), 0.0));
        assert!(approx(changes.pe_ratio_change.unwrap(), 2.0));
        assert!(approx(changes.pe_ratio_pct_change.unwrap(), 50.0));
    }

    #[test]
    fn test_with_changes_null_and_zero_previous_values() {
        let records = vec![
            record(1, 0, "alpha", None, Some(0.0), None),
            record(2, 1, "alpha", Some(4e9), Some(1e9), Some(4.0)),
        ];

        let changes = &with_changes(&records)[1].changes;
        // Previous market cap absent: no delta at all.
        assert_eq!(changes.market_cap_change, None);
        // Previous revenue zero: delta present, percentage undefined.
        assert!(approx(changes.annualized_revenue_change.unwrap(), 1e9));
        assert_eq!(changes.annualized_revenue_pct_change, None);
    }

    #[test]
    fn test_summarize_statistics() {
        let summary = summarize("pe_ratio", &[4.0, 1.0, 3.0, 2.0]).unwrap();

        assert_eq!(summary.count, 4);
        assert!(approx(summary.min, 1.0));
        assert!(approx(summary.max, 4.0));
        assert!(approx(summary.mean, 2.5));
        assert!(approx(summary.median, 2.5));
        assert!(approx(summary.percentile_25, 2.0));
        assert!(approx(summary.percentile_75, 4.0));
        assert!(approx(summary.volatility, 1.25_f64.sqrt()));
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize("pe_ratio", &[]).is_none());
    }

    #[test]
    fn test_field_summaries_skip_all_null_fields() {
        let records = vec![record(1, 0, "alpha", Some(4e9), None, None)];

        let summaries = field_summaries(&records);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].field, "market_cap");
        assert_eq!(summaries[0].count, 1);
    }
}
