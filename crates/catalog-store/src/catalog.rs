//! Science file catalog backed by SQLite.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use tracker_common::{MissionConfig, TrackerError, TrackerResult};

use crate::schema::TableNames;

/// A unit of work against the catalog. Dropping it without `commit` rolls back.
pub type CatalogTx = Transaction<'static, Sqlite>;

/// Database connection pool and the mission's table layout.
///
/// Cloning is cheap; every clone shares the same pool.
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
    tables: Arc<TableNames>,
    slot_count: usize,
}

impl Catalog {
    /// Open the database named by `config.db_host`.
    pub async fn connect(config: &MissionConfig) -> TrackerResult<Self> {
        config.validate()?;
        let pool = open_pool(&config.db_host).await?;
        info!(
            db_host = %config.db_host,
            mission = %config.mission_name,
            "Connected to catalog"
        );
        Ok(Self::from_pool(pool, config))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool, config: &MissionConfig) -> Self {
        Self {
            pool,
            tables: Arc::new(TableNames::new(&config.mission_name)),
            slot_count: config.slot_count(),
        }
    }

    /// Liveness check. Fails with `Connection` when the store is unreachable or closed.
    pub async fn ping(&self) -> TrackerResult<()> {
        if self.pool.is_closed() {
            return Err(TrackerError::Connection("pool is closed".to_string()));
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| TrackerError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Start a transaction. Each engine step runs inside exactly one.
    pub async fn begin(&self) -> TrackerResult<CatalogTx> {
        if self.pool.is_closed() {
            return Err(TrackerError::Connection("pool is closed".to_string()));
        }
        Ok(self.pool.begin().await?)
    }

    /// Acquire a plain connection for read-only work.
    pub async fn acquire(&self) -> TrackerResult<PoolConnection<Sqlite>> {
        if self.pool.is_closed() {
            return Err(TrackerError::Connection("pool is closed".to_string()));
        }
        Ok(self.pool.acquire().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Number of instrument slot columns in the configuration table.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of rows in a table, by full name.
    pub async fn row_count(&self, table: &str) -> TrackerResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Close every pooled connection. Later calls fail with `Connection`.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Catalog pool closed");
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Build the pool for a sqlx SQLite URL.
///
/// An in-memory database lives only as long as its connection, so it gets a
/// single connection that is never recycled.
async fn open_pool(url: &str) -> TrackerResult<SqlitePool> {
    let memory = is_memory_url(url);

    let mut options = SqliteConnectOptions::from_str(url)
        .map_err(|e| TrackerError::Config(format!("Invalid db_host '{}': {}", url, e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let pool_options = if memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    pool_options
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| TrackerError::Connection(format!("Connection to '{}' failed: {}", url, e)))
}
