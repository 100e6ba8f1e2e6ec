//! Write operations for SeaOrmStore
//!
//! `put`/`batch_put` run in one transaction each. Every insert runs in a
//! savepoint so a unique violation from a concurrent writer only rolls back
//! that insert; the existing id is then looked up in the same transaction
//! with a locking read, which sees the winner's committed row.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, QueryFilter, QuerySelect, Select, SqlErr, TransactionTrait,
};
use tracing::{debug, trace};

use super::{SeaOrmStore, from_db_id};
use crate::errors::{Result, UrlshrtError};
use crate::model::{LinkId, UserId};
use crate::storage::BatchPutOutcome;

use migration::entities::{link, user};

/// 单条写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inserted {
    New(LinkId),
    Existing(LinkId),
}

impl Inserted {
    fn id(self) -> LinkId {
        match self {
            Inserted::New(id) | Inserted::Existing(id) => id,
        }
    }
}

/// 未删除的同 URL 链接查询
///
/// `locking` 时使用 `FOR SHARE` 加锁读：MySQL 可重复读隔离级别下普通 SELECT 读的是事务快照，
/// 看不到并发事务刚提交的行。SQLite 没有行锁，写者已由 `WriteGate` 串行化。
fn live_lookup(url: &str, backend: DbBackend, locking: bool) -> Select<link::Entity> {
    let select = link::Entity::find()
        .filter(link::Column::Url.eq(url))
        .filter(link::Column::IsDeleted.eq(false));
    if locking && backend != DbBackend::Sqlite {
        select.lock_shared()
    } else {
        select
    }
}

async fn find_live<C: ConnectionTrait>(
    conn: &C,
    url: &str,
    locking: bool,
) -> std::result::Result<Option<LinkId>, DbErr> {
    Ok(live_lookup(url, conn.get_database_backend(), locking)
        .one(conn)
        .await?
        .map(|model| from_db_id(model.id)))
}

/// 在事务内插入，URL 已存在时返回已有 ID
async fn insert_or_lookup(
    txn: &DatabaseTransaction,
    owner: UserId,
    url: &str,
) -> std::result::Result<Inserted, DbErr> {
    if let Some(existing) = find_live(txn, url, false).await? {
        return Ok(Inserted::Existing(existing));
    }

    let savepoint = txn.begin().await?;
    let model = link::ActiveModel {
        url: Set(url.to_string()),
        user_id: Set(owner.get() as i64),
        is_deleted: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match model.insert(&savepoint).await {
        Ok(model) => {
            savepoint.commit().await?;
            Ok(Inserted::New(from_db_id(model.id)))
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // 并发写入者抢先插入了同一 URL
            savepoint.rollback().await?;
            trace!("SeaOrmStore: unique violation on insert, looking up existing link");
            find_live(txn, url, true)
                .await?
                .map(Inserted::Existing)
                .ok_or(e)
        }
        Err(e) => Err(e),
    }
}

impl SeaOrmStore {
    pub(super) async fn insert_link(&self, owner: UserId, url: &str) -> Result<LinkId> {
        let db = &self.db;
        let writes = &self.writes;

        let inserted = self.retry.run("put", || async {
            let _gate = writes.enter().await;
            let txn = db.begin().await?;
            let inserted = insert_or_lookup(&txn, owner, url).await?;
            txn.commit().await?;
            Ok::<_, DbErr>(inserted)
        })
        .await
        .map_err(|e| UrlshrtError::storage_unavailable(format!("Failed to store link: {}", e)))?;

        match inserted {
            Inserted::New(id) => {
                trace!("SeaOrmStore: stored link {} for user {}", id, owner);
                Ok(id)
            }
            Inserted::Existing(id) => Err(UrlshrtError::duplicate_url(url, id)),
        }
    }

    /// 批量写入（单个事务，任一错误整体回滚）
    pub(super) async fn insert_links(
        &self,
        owner: UserId,
        urls: &[String],
    ) -> Result<BatchPutOutcome> {
        if urls.is_empty() {
            return Ok(BatchPutOutcome::default());
        }

        let db = &self.db;
        let writes = &self.writes;

        let results = self.retry.run("batch_put", || async {
            let _gate = writes.enter().await;
            let txn = db.begin().await?;
            let mut results = Vec::with_capacity(urls.len());
            // 同一批次内重复的 URL
            let mut seen: HashMap<&str, LinkId> = HashMap::new();

            for url in urls {
                if let Some(&id) = seen.get(url.as_str()) {
                    results.push(Inserted::Existing(id));
                    continue;
                }
                let inserted = insert_or_lookup(&txn, owner, url).await?;
                seen.insert(url.as_str(), inserted.id());
                results.push(inserted);
            }

            txn.commit().await?;
            Ok::<_, DbErr>(results)
        })
        .await
        .map_err(|e| UrlshrtError::storage_unavailable(format!("Failed to store links: {}", e)))?;

        let mut outcome = BatchPutOutcome {
            ids: Vec::with_capacity(urls.len()),
            duplicates: Vec::new(),
        };
        for (url, inserted) in urls.iter().zip(results) {
            if let Inserted::Existing(_) = inserted {
                outcome.duplicates.push(url.clone());
            }
            outcome.ids.push(inserted.id());
        }

        debug!(
            "SeaOrmStore: batch stored {} links ({} duplicates) for user {}",
            urls.len() - outcome.duplicates.len(),
            outcome.duplicates.len(),
            owner
        );
        Ok(outcome)
    }

    pub(super) async fn insert_user(&self) -> Result<UserId> {
        let db = &self.db;
        let writes = &self.writes;

        let model = self
            .retry
            .run("create_user", || async {
                let _gate = writes.enter().await;
                user::ActiveModel {
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db)
                .await
            })
            .await
            .map_err(|e| UrlshrtError::storage_unavailable(format!("Failed to create user: {}", e)))?;

        let id = UserId::new(model.id as u64);
        debug!("SeaOrmStore: created user {}", id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::QueryTrait;

    fn lookup_sql(backend: DbBackend, locking: bool) -> String {
        live_lookup("http://a.com", backend, locking)
            .build(backend)
            .to_string()
    }

    #[test]
    fn test_live_lookup_locks_after_conflict() {
        assert!(lookup_sql(DbBackend::MySql, true).contains("SHARE"));
        assert!(lookup_sql(DbBackend::Postgres, true).contains("FOR SHARE"));
        assert!(!lookup_sql(DbBackend::MySql, false).contains("SHARE"));
    }

    #[test]
    fn test_live_lookup_never_locks_on_sqlite() {
        let sql = lookup_sql(DbBackend::Sqlite, true);
        assert!(!sql.contains("SHARE"));
        assert!(sql.contains("http://a.com"));
    }
}
