use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use defi_metrics::database::MetricStore;
use defi_metrics::models::{Config, MetricRecord};
use defi_metrics::normalize::NOT_CALCULABLE;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("defi_metrics=warn")),
        )
        .init();

    let matches = Command::new("show-latest")
        .about("Show the most recent stored metrics per protocol")
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to the SQLite store (defaults to DATABASE_PATH)"),
        )
        .arg(
            Arg::new("protocol")
                .long("protocol")
                .value_name("NAME")
                .help("Limit output to one protocol"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Emit records as JSON lines instead of text"),
        )
        .get_matches();

    let mut config = Config::from_env()?;
    if let Some(db) = matches.get_one::<String>("database") {
        config.database_path = db.clone();
    }

    let store = MetricStore::connect(&config.database_path).await?;

    // The store session is scoped to this run: close it whether the query
    // succeeded or bailed out.
    let result = run(&matches, &store).await;
    store.close().await;
    result
}

async fn run(matches: &ArgMatches, store: &MetricStore) -> Result<()> {
    let records: Vec<MetricRecord> = match matches.get_one::<String>("protocol") {
        Some(protocol) => store
            .latest_for_protocol(protocol)
            .await?
            .into_iter()
            .collect(),
        None => store.latest_per_protocol().await?,
    };

    if records.is_empty() {
        println!("No data found in store.");
    } else if matches.get_flag("json") {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else {
        println!("Latest metrics per protocol");
        println!("{}", "=".repeat(60));
        for record in &records {
            print_record(record);
        }

        let stats = store.stats().await?;
        println!(
            "{} records total across {} protocol(s)",
            stats.total_records,
            stats.protocols.len()
        );
    }

    Ok(())
}

fn print_record(record: &MetricRecord) {
    println!("Protocol:           {}", record.protocol);
    if let Some(ts) = record.timestamp {
        println!("Timestamp:          {}", ts.to_rfc3339());
    }
    println!("Market cap:         {}", fmt_value(record.market_cap));
    println!("Annualized revenue: {}", fmt_value(record.annualized_revenue));
    println!("P/E ratio:          {}", fmt_ratio(record.pe_ratio));
    println!("{}", "-".repeat(40));
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${:.0}", v),
        None => "N/A".to_string(),
    }
}

fn fmt_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => NOT_CALCULABLE.to_string(),
    }
}
