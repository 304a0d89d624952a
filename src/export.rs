//! CSV serialization of the metric history for external tools.

use std::io::Write;

use anyhow::Result;
use csv::Writer;

use crate::analysis;
use crate::models::MetricRecord;

const BASE_HEADER: [&str; 7] = [
    "id",
    "timestamp",
    "protocol",
    "price",
    "market_cap",
    "annualized_revenue",
    "pe_ratio",
];

const CHANGE_HEADER: [&str; 6] = [
    "market_cap_change",
    "market_cap_pct_change",
    "annualized_revenue_change",
    "annualized_revenue_pct_change",
    "pe_ratio_change",
    "pe_ratio_pct_change",
];

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn base_fields(record: &MetricRecord) -> Vec<String> {
    vec![
        record.id.map(|id| id.to_string()).unwrap_or_default(),
        record
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default(),
        record.protocol.clone(),
        opt_cell(record.price),
        opt_cell(record.market_cap),
        opt_cell(record.annualized_revenue),
        opt_cell(record.pe_ratio),
    ]
}

/// Write the history as CSV, one row per record, nulls as empty cells.
pub fn write_history<W: Write>(records: &[MetricRecord], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(BASE_HEADER)?;
    for record in records {
        writer.write_record(base_fields(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the history as CSV with per-protocol delta and percentage-change
/// columns appended; rows come out ordered by protocol and time ascending.
pub fn write_history_with_changes<W: Write>(records: &[MetricRecord], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    let header: Vec<&str> = BASE_HEADER.iter().chain(CHANGE_HEADER.iter()).copied().collect();
    writer.write_record(header)?;

    for enriched in analysis::with_changes(records) {
        let mut fields = base_fields(&enriched.record);
        fields.push(opt_cell(enriched.changes.market_cap_change));
        fields.push(opt_cell(enriched.changes.market_cap_pct_change));
        fields.push(opt_cell(enriched.changes.annualized_revenue_change));
        fields.push(opt_cell(enriched.changes.annualized_revenue_pct_change));
        fields.push(opt_cell(enriched.changes.pe_ratio_change));
        fields.push(opt_cell(enriched.changes.pe_ratio_pct_change));
        writer.write_record(fields)?;
    }

    writer.flush()?;
    Ok(())
}
