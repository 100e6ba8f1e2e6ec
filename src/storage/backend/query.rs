//! Read operations for SeaOrmStore

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::error;

use super::{SeaOrmStore, from_db_id, to_db_id};
use crate::errors::{Result, UrlshrtError};
use crate::model::{LinkId, UserId};

use migration::entities::link;

impl SeaOrmStore {
    pub(super) async fn find_link(&self, id: LinkId) -> Result<String> {
        let Some(db_id) = to_db_id(id) else {
            return Err(UrlshrtError::not_found(format!("link {} not found", id)));
        };
        let db = &self.db;

        let result = self.retry.run(&format!("get({})", id), || async {
            link::Entity::find_by_id(db_id).one(db).await
        })
        .await;

        match result {
            Ok(Some(model)) if model.is_deleted => {
                Err(UrlshrtError::gone(format!("link {} is deleted", id)))
            }
            Ok(Some(model)) => Ok(model.url),
            Ok(None) => Err(UrlshrtError::not_found(format!("link {} not found", id))),
            Err(e) => {
                error!("SeaOrmStore: get({}) failed after retries: {}", id, e);
                Err(e.into())
            }
        }
    }

    pub(super) async fn find_user_links(&self, owner: UserId) -> Result<BTreeMap<LinkId, String>> {
        let db = &self.db;
        let user_id = owner.get() as i64;

        let rows: Vec<(i64, String)> =
            self.retry.run(&format!("user_links({})", owner), || async {
                link::Entity::find()
                    .select_only()
                    .column(link::Column::Id)
                    .column(link::Column::Url)
                    .filter(link::Column::UserId.eq(user_id))
                    .order_by_asc(link::Column::Id)
                    .into_tuple::<(i64, String)>()
                    .all(db)
                    .await
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, url)| (from_db_id(id), url))
            .collect())
    }
}
