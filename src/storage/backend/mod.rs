//! SeaORM storage backend
//!
//! Relational link store on SQLite, MySQL/MariaDB or PostgreSQL.
//! Writes run inside transactions; deletions go through the shared
//! deletion pipeline and are applied by [`SeaOrmDeleteSink`].

mod connection;
mod delete_sink;
mod mutations;
mod query;
pub mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{Span, warn};

use super::deletion::{DeletePipeline, DeleteSink};
use super::{BatchPutOutcome, LinkStore};
use crate::config::{DeletionConfig, StorageConfig};
use crate::errors::{Result, UrlshrtError};
use crate::model::{DeleteRequest, LinkId, UserId};

pub use connection::open_database;
pub use delete_sink::SeaOrmDeleteSink;
pub use retry::RetryPolicy;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(UrlshrtError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported schemes: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// LinkId 与数据库主键互转；超出 i64 范围的 ID 不可能存在
pub(crate) fn to_db_id(id: LinkId) -> Option<i64> {
    i64::try_from(id.get()).ok()
}

pub(crate) fn from_db_id(id: i64) -> LinkId {
    LinkId::new(id as u64)
}

/// 写事务闸门
///
/// SQLite 同一时刻只有一个写者，WAL 模式下先读后写的延迟事务在升级写锁时会以
/// SQLITE_BUSY_SNAPSHOT 失败。同一进程内的写事务在这里排队；其它数据库不加限制。
#[derive(Clone, Default)]
pub(crate) struct WriteGate(Option<Arc<Mutex<()>>>);

impl WriteGate {
    pub(crate) fn for_backend(backend_name: &str) -> Self {
        if backend_name == "sqlite" {
            Self(Some(Arc::new(Mutex::new(()))))
        } else {
            Self(None)
        }
    }

    pub(crate) async fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.0 {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

/// SeaORM-based link store
pub struct SeaOrmStore {
    db: DatabaseConnection,
    backend_name: String,
    retry: RetryPolicy,
    writes: WriteGate,
    pipeline: DeletePipeline,
}

impl SeaOrmStore {
    pub async fn new(
        config: &StorageConfig,
        backend_name: &str,
        deletion: DeletionConfig,
        span: Span,
    ) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(UrlshrtError::database_config("database_url is not set"));
        }

        let db = open_database(config, backend_name).await?;

        let retry = RetryPolicy::from(config);
        let writes = WriteGate::for_backend(backend_name);
        let sink = SeaOrmDeleteSink::new(db.clone(), retry, writes.clone());
        let pipeline = DeletePipeline::spawn(Arc::new(sink) as Arc<dyn DeleteSink>, deletion, span);

        warn!("{} Storage initialized.", backend_name.to_uppercase());
        Ok(Self {
            db,
            backend_name: backend_name.to_string(),
            retry,
            writes,
            pipeline,
        })
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait::async_trait]
impl LinkStore for SeaOrmStore {
    async fn put(&self, owner: UserId, url: &str) -> Result<LinkId> {
        self.insert_link(owner, url).await
    }

    async fn batch_put(&self, owner: UserId, urls: &[String]) -> Result<BatchPutOutcome> {
        self.insert_links(owner, urls).await
    }

    async fn get(&self, id: LinkId) -> Result<String> {
        self.find_link(id).await
    }

    async fn user_links(&self, owner: UserId) -> Result<BTreeMap<LinkId, String>> {
        self.find_user_links(owner).await
    }

    async fn create_user(&self) -> Result<UserId> {
        self.insert_user().await
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| UrlshrtError::storage_unavailable(format!("Database ping failed: {}", e)))
    }

    async fn request_delete(&self, owner: UserId, ids: &[LinkId]) -> Result<()> {
        let requests = ids
            .iter()
            .map(|&id| DeleteRequest::new(owner, id))
            .collect();
        self.pipeline.submit(requests).await
    }

    async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}
