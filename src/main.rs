use anyhow::Result;
use clap::{Arg, Command};
use tracing::error;
use tracing_subscriber::EnvFilter;

use defi_metrics::api::DefiLlamaClient;
use defi_metrics::collector::MetricsCollector;
use defi_metrics::database::MetricStore;
use defi_metrics::models::Config;
use defi_metrics::normalize::NOT_CALCULABLE;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("defi_metrics=info")),
        )
        .init();

    let matches = Command::new("defi-metrics")
        .about("Scrape protocol metrics from DeFiLlama and append them to the local time series")
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to the SQLite store (defaults to DATABASE_PATH)"),
        )
        .arg(
            Arg::new("base_url")
                .long("base-url")
                .value_name("URL")
                .help("Override the protocol page base URL"),
        )
        .arg(
            Arg::new("protocols")
                .value_name("PROTOCOL")
                .num_args(0..)
                .help("Protocol slugs to scrape (default: hyperliquid)"),
        )
        .get_matches();

    let mut config = Config::from_env()?;
    if let Some(db) = matches.get_one::<String>("database") {
        config.database_path = db.clone();
    }
    if let Some(base) = matches.get_one::<String>("base_url") {
        config.base_url = base.clone();
    }

    let protocols: Vec<String> = matches
        .get_many::<String>("protocols")
        .map(|values| values.cloned().collect())
        .unwrap_or_else(|| vec!["hyperliquid".to_string()]);

    let store = match MetricStore::connect(&config.database_path).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open metric store: {}", e);
            eprintln!("Store error: {}", e);
            std::process::exit(1);
        }
    };

    // The store session is scoped to this run: close it whether the
    // pipeline succeeded or bailed out.
    let result = run(&config, &protocols, store.clone()).await;
    store.close().await;
    result
}

async fn run(config: &Config, protocols: &[String], store: MetricStore) -> Result<()> {
    let client = DefiLlamaClient::new(config)?;
    let collector = MetricsCollector::new(client, store, config.request_delay_ms);

    println!(
        "Scraping {} protocol(s) from {}",
        protocols.len(),
        config.base_url
    );
    let stored = collector.collect_all(protocols).await;
    println!("Stored {}/{} records", stored, protocols.len());

    for protocol in protocols {
        match collector.store().latest_for_protocol(protocol).await {
            Ok(Some(record)) => println!(
                "  {}: market cap {}, annualized revenue {}, P/E {}",
                protocol,
                fmt_value(record.market_cap),
                fmt_value(record.annualized_revenue),
                fmt_ratio(record.pe_ratio),
            ),
            Ok(None) => println!("  {}: no data stored", protocol),
            Err(e) => error!("Failed to read back {}: {}", protocol, e),
        }
    }

    let stats = collector.store().stats().await?;
    println!(
        "Store now holds {} records across {} protocol(s)",
        stats.total_records,
        stats.protocols.len()
    );

    Ok(())
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
