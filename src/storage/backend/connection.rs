//! 数据库连接与迁移
//!
//! SQLite 直接用 sqlx 建池以便设置 WAL 等连接参数；MySQL/PostgreSQL 走 SeaORM 的 `ConnectOptions`。

use std::str::FromStr;
use std::time::Duration;

use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::errors::{Result, UrlshrtError};
use migration::{Migrator, MigratorTrait};

/// 等待其它进程释放 SQLite 写锁的上限
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// 按数据库类型建立连接池并执行迁移
pub async fn open_database(
    config: &StorageConfig,
    backend_name: &str,
) -> Result<DatabaseConnection> {
    let db = match backend_name {
        "sqlite" => connect_sqlite(&config.database_url, config.pool_size).await?,
        _ => connect_server(&config.database_url, backend_name, config.pool_size).await?,
    };
    run_migrations(&db).await?;
    Ok(db)
}

fn sqlite_options(database_url: &str) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| UrlshrtError::database_config(format!("Invalid SQLite URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT);
    Ok(options)
}

async fn connect_sqlite(database_url: &str, pool_size: u32) -> Result<DatabaseConnection> {
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size.max(1))
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(sqlite_options(database_url)?)
        .await
        .map_err(|e| {
            UrlshrtError::storage_unavailable(format!("Cannot open SQLite database: {}", e))
        })?;

    debug!("SQLite pool ready ({} connections max)", pool_size.max(1));
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn connect_server(
    database_url: &str,
    backend_name: &str,
    pool_size: u32,
) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(pool_size.max(1))
        .min_connections(pool_size.clamp(1, 5))
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(CONNECT_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .sqlx_logging(false);

    Database::connect(options).await.map_err(|e| {
        UrlshrtError::storage_unavailable(format!(
            "Cannot connect to {} database: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| UrlshrtError::storage_unavailable(format!("Migration failed: {}", e)))?;

    info!("Database migrations completed");
    Ok(())
}
