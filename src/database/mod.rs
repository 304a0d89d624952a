use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::MetricsError;
use crate::models::{MetricRecord, StoreStats};

/// Append-only SQLite store of metric history.
///
/// `append` is the only mutator; rows are never updated or deleted, so
/// "latest" is always derived by filtering on the way out.
#[derive(Clone)]
pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    /// Open the store at the given path, creating file and schema when
    /// missing.
    pub async fn connect(database_path: &str) -> Result<Self, MetricsError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await?;

        // WAL keeps readers from blocking the single writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;

        // AUTOINCREMENT: ids stay strictly increasing and are never reused
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME NOT NULL,
                protocol TEXT NOT NULL,
                price REAL,
                market_cap REAL,
                annualized_revenue REAL,
                pe_ratio REAL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_protocol ON metrics(protocol)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp)")
            .execute(&pool)
            .await?;

        info!("Metric store initialized at {}", database_path);
        Ok(Self { pool })
    }

    /// Append one observation and return the assigned id.
    ///
    /// Fills in the timestamp when the record carries none. A record with
    /// every metric null is still stored; only an empty protocol key is
    /// rejected.
    pub async fn append(&self, record: &MetricRecord) -> Result<i64, MetricsError> {
        if record.protocol.is_empty() {
            return Err(MetricsError::EmptyProtocolKey);
        }

        let timestamp = record.timestamp.unwrap_or_else(Utc::now);

        let row = sqlx::query(
            r#"
            INSERT INTO metrics (timestamp, protocol, price, market_cap, annualized_revenue, pe_ratio)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(timestamp)
        .bind(&record.protocol)
        .bind(record.price)
        .bind(record.market_cap)
        .bind(record.annualized_revenue)
        .bind(record.pe_ratio)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("id"))
    }

    /// Full history, most recent first. The id breaks sub-second timestamp
    /// ties, so read order always matches reverse append order.
    pub async fn read_all(&self) -> Result<Vec<MetricRecord>, MetricsError> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, protocol, price, market_cap, annualized_revenue, pe_ratio
            FROM metrics
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_record).collect())
    }

    /// For every protocol with at least one observation, the row with the
    /// highest id.
    pub async fn latest_per_protocol(&self) -> Result<Vec<MetricRecord>, MetricsError> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, protocol, price, market_cap, annualized_revenue, pe_ratio
            FROM metrics
            WHERE id IN (SELECT MAX(id) FROM metrics GROUP BY protocol)
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_record).collect())
    }

    /// Most recent observation for one protocol, if any.
    pub async fn latest_for_protocol(
        &self,
        protocol: &str,
    ) -> Result<Option<MetricRecord>, MetricsError> {
        let row = sqlx::query(
            r#"
            SELECT id, timestamp, protocol, price, market_cap, annualized_revenue, pe_ratio
            FROM metrics
            WHERE protocol = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(protocol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_record))
    }

    /// Aggregate statistics for status output.
    pub async fn stats(&self) -> Result<StoreStats, MetricsError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total, MIN(timestamp) AS earliest, MAX(timestamp) AS latest
            FROM metrics
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let protocols = sqlx::query("SELECT DISTINCT protocol FROM metrics ORDER BY protocol")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| r.get::<String, _>("protocol"))
            .collect();

        Ok(StoreStats {
            total_records: row.get::<i64, _>("total"),
            protocols,
            earliest: row.get::<Option<DateTime<Utc>>, _>("earliest"),
            latest: row.get::<Option<DateTime<Utc>>, _>("latest"),
        })
    }

    /// Flush and release the underlying pool; the session is over after
    /// this.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn map_record(row: SqliteRow) -> MetricRecord {
    MetricRecord {
        id: Some(row.get::<i64, _>("id")),
        timestamp: Some(row.get::<DateTime<Utc>, _>("timestamp")),
        protocol: row.get::<String, _>("protocol"),
        price: row.get::<Option<f64>, _>("price"),
        market_cap: row.get::<Option<f64>, _>("market_cap"),
        annualized_revenue: row.get::<Option<f64>, _>("annualized_revenue"),
        pe_ratio: row.get::<Option<f64>, _>("pe_ratio"),
    }
}
