use std::fs::File;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use defi_metrics::database::MetricStore;
use defi_metrics::models::Config;
use defi_metrics::{analysis, export};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("defi_metrics=warn")),
        )
        .init();

    let matches = Command::new("export-history")
        .about("Export the stored metric history to CSV")
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to the SQLite store (defaults to DATABASE_PATH)"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .value_name("FILE")
                .default_value("historical_data.csv")
                .help("Output CSV path"),
        )
        .arg(
            Arg::new("with_changes")
                .long("with-changes")
                .action(ArgAction::SetTrue)
                .help("Append per-protocol delta and percentage-change columns"),
        )
        .get_matches();

    let mut config = Config::from_env()?;
    if let Some(db) = matches.get_one::<String>("database") {
        config.database_path = db.clone();
    }

    let store = MetricStore::connect(&config.database_path).await?;

    // The store session is scoped to this run: close it whether the export
    // succeeded or bailed out.
    let result = run(&matches, &store).await;
    store.close().await;
    result
}

async fn run(matches: &ArgMatches, store: &MetricStore) -> Result<()> {
    let records = store.read_all().await?;

    if records.is_empty() {
        println!("No data found in store, nothing to export.");
        return Ok(());
    }

    let report = analysis::missing_value_report(&records);
    println!("Exporting {} records", report.total_records);
    for field in &report.fields {
        println!(
            "  {}: {} missing ({:.1}%)",
            field.field, field.missing, field.missing_pct
        );
    }

    for summary in analysis::field_summaries(&records) {
        println!(
            "  {}: count {}, mean {:.2}, min {:.2}, max {:.2}",
            summary.field, summary.count, summary.mean, summary.min, summary.max
        );
    }

    let out_path = matches.get_one::<String>("out").unwrap();
    let file = File::create(out_path).with_context(|| format!("creating {}", out_path))?;
    if matches.get_flag("with_changes") {
        export::write_history_with_changes(&records, file)?;
    } else {
        export::write_history(&records, file)?;
    }
    println!("History written to {}", out_path);

    Ok(())
}
