//! links 表迁移
//!
//! 创建 links 表，id 为自增主键（即短链接序号），并保证未删除链接的 url 唯一，
//! 用于并发写入下的重复检测。PostgreSQL/SQLite 使用部分唯一索引；MySQL 没有部分索引，
//! 改为在生成列 `live_url_hash`（已删除时为 NULL）上建唯一索引。

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 links 表
        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Links::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Links::Url).text().not_null())
                    .col(ColumnDef::new(Links::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Links::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Links::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 用户链接列表查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_user_id")
                    .table(Links::Table)
                    .col(Links::UserId)
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();
        match manager.get_database_backend() {
            DatabaseBackend::Postgres | DatabaseBackend::Sqlite => {
                // 已删除的链接不参与唯一性约束
                conn.execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_live_url ON links (url) WHERE is_deleted = false",
                )
                .await?;
            }
            DatabaseBackend::MySql => {
                conn.execute_unprepared(
                    "ALTER TABLE links ADD COLUMN live_url_hash CHAR(64) \
                     GENERATED ALWAYS AS (IF(is_deleted, NULL, SHA2(url, 256))) STORED",
                )
                .await?;
                // 唯一索引允许多个 NULL，已删除的链接互不冲突
                conn.execute_unprepared(
                    "CREATE UNIQUE INDEX idx_links_live_url ON links (live_url_hash)",
                )
                .await?;
                // TEXT 列只能建前缀索引，用于按 URL 查找
                conn.execute_unprepared("CREATE INDEX idx_links_url ON links (url(255))")
                    .await?;
            }
            _ => {}
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() == DatabaseBackend::MySql {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_links_url")
                        .table(Links::Table)
                        .to_owned(),
                )
                .await
                .ok();
        }

        manager
            .drop_index(
                Index::drop()
                    .name("idx_links_live_url")
                    .table(Links::Table)
                    .to_owned(),
            )
            .await
            .ok();

        manager
            .drop_index(
                Index::drop()
                    .name("idx_links_user_id")
                    .table(Links::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Links::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Links {
    Table,
    Id,
    Url,
    UserId,
    IsDeleted,
    CreatedAt,
}
