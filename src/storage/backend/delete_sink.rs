//! DeleteSink implementation for the relational store
//!
//! A flush runs in one transaction: load the requested rows, check ownership
//! per request, then mark the accepted rows deleted with a single UPDATE.
//! Transient failures rerun the whole transaction through [`RetryPolicy`].

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    TransactionTrait,
};
use tracing::{debug, trace, warn};

use super::{RetryPolicy, WriteGate, from_db_id, to_db_id};
use crate::errors::UrlshrtError;
use crate::model::{DeleteRequest, LinkId, UserId};
use crate::storage::deletion::{DeleteReport, DeleteSink};

use migration::entities::link;

pub struct SeaOrmDeleteSink {
    db: DatabaseConnection,
    retry: RetryPolicy,
    writes: WriteGate,
}

impl SeaOrmDeleteSink {
    pub(crate) fn new(db: DatabaseConnection, retry: RetryPolicy, writes: WriteGate) -> Self {
        Self { db, retry, writes }
    }

    async fn flush(&self, batch: &[DeleteRequest]) -> Result<DeleteReport, DbErr> {
        let db_ids: Vec<i64> = batch.iter().filter_map(|r| to_db_id(r.link_id)).collect();

        let _gate = self.writes.enter().await;
        let txn = self.db.begin().await?;

        // id → (owner, is_deleted)
        let rows: HashMap<LinkId, (UserId, bool)> = link::Entity::find()
            .select_only()
            .column(link::Column::Id)
            .column(link::Column::UserId)
            .column(link::Column::IsDeleted)
            .filter(link::Column::Id.is_in(db_ids))
            .into_tuple::<(i64, i64, bool)>()
            .all(&txn)
            .await?
            .into_iter()
            .map(|(id, owner, deleted)| (from_db_id(id), (UserId::new(owner as u64), deleted)))
            .collect();

        let mut report = DeleteReport::default();
        let mut accepted: Vec<i64> = Vec::with_capacity(batch.len());

        for request in batch {
            match rows.get(&request.link_id) {
                None => {
                    debug!("SeaOrmStore: delete of unknown link {} ignored", request.link_id);
                    report.rejected += 1;
                }
                Some((owner, _)) if *owner != request.owner => {
                    let err = UrlshrtError::ownership_mismatch(format!(
                        "user {} does not own link {}",
                        request.owner, request.link_id
                    ));
                    warn!("SeaOrmStore: delete dropped: {}", err);
                    report.rejected += 1;
                }
                Some((_, true)) => {
                    trace!("SeaOrmStore: link {} already deleted", request.link_id);
                    report.rejected += 1;
                }
                Some(_) => match to_db_id(request.link_id) {
                    Some(id) if !accepted.contains(&id) => {
                        accepted.push(id);
                        report.applied += 1;
                    }
                    _ => {
                        trace!("SeaOrmStore: link {} already queued in this batch", request.link_id);
                        report.rejected += 1;
                    }
                },
            }
        }

        if !accepted.is_empty() {
            link::Entity::update_many()
                .col_expr(link::Column::IsDeleted, Expr::value(true))
                .filter(link::Column::Id.is_in(accepted))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(report)
    }
}

#[async_trait]
impl DeleteSink for SeaOrmDeleteSink {
    async fn apply_deletes(&self, batch: Vec<DeleteRequest>) -> anyhow::Result<DeleteReport> {
        if batch.is_empty() {
            return Ok(DeleteReport::default());
        }

        Ok(self
            .retry
            .run("apply_deletes", || self.flush(&batch))
            .await?)
    }
}
