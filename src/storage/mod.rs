use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{Span, info};

use crate::config::{DeletionConfig, StorageConfig};
use crate::errors::{Result, UrlshrtError};
use crate::model::{LinkId, UserId};

pub mod backend;
pub mod deletion;
pub mod memory;

pub use backend::SeaOrmStore;
pub use memory::MemoryStore;

/// 批量写入结果
///
/// `ids` 与输入一一对应（按输入顺序），重复项给出已有链接的 ID。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPutOutcome {
    pub ids: Vec<LinkId>,
    pub duplicates: Vec<String>,
}

impl BatchPutOutcome {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// 存在重复项时返回合并后的 `DuplicateUrls` 错误
    pub fn duplicate_error(&self) -> Option<UrlshrtError> {
        self.has_duplicates()
            .then(|| UrlshrtError::duplicate_urls(&self.duplicates))
    }
}

/// 短链接存储
///
/// 所有按用户划分的操作都显式接收 `UserId`。
/// 删除只入队，由删除管道异步生效。
#[async_trait::async_trait]
pub trait LinkStore: Send + Sync {
    /// 写入单个 URL；未删除的相同 URL 已存在时返回 `DuplicateUrl`（携带可用 ID）
    async fn put(&self, owner: UserId, url: &str) -> Result<LinkId>;

    /// 原子地写入一批 URL，重复项不会中断整批
    async fn batch_put(&self, owner: UserId, urls: &[String]) -> Result<BatchPutOutcome>;

    /// `NotFound`：从未分配；`Gone`：已删除
    async fn get(&self, id: LinkId) -> Result<String>;

    /// 该用户创建的全部链接（包括已删除的）
    async fn user_links(&self, owner: UserId) -> Result<BTreeMap<LinkId, String>>;

    async fn create_user(&self) -> Result<UserId>;

    async fn ping(&self) -> Result<()>;

    /// 提交删除请求，不等待物理删除
    async fn request_delete(&self, owner: UserId, ids: &[LinkId]) -> Result<()>;

    /// 排空删除管道并停止 worker（幂等）
    async fn shutdown(&self);

    fn backend_name(&self) -> &str;
}

pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置创建存储：`database_url` 非空时使用关系型存储，否则使用内存存储
    pub async fn create(
        config: &StorageConfig,
        deletion: DeletionConfig,
    ) -> Result<Arc<dyn LinkStore>> {
        let store: Arc<dyn LinkStore> = if config.database_url.is_empty() {
            let path = (!config.file_storage_path.is_empty())
                .then(|| PathBuf::from(&config.file_storage_path));
            let span = tracing::info_span!("store", backend = "memory");
            Arc::new(MemoryStore::open(path, deletion, span)?)
        } else {
            // 从 URL 自动推断数据库类型
            let backend_type = backend::infer_backend_from_url(&config.database_url)?;
            let span = tracing::info_span!("store", backend = %backend_type);
            Arc::new(SeaOrmStore::new(config, &backend_type, deletion, span).await?)
        };

        info!("Using storage backend: {}", store.backend_name());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_put_outcome_without_duplicates() {
        let outcome = BatchPutOutcome {
            ids: vec![LinkId::new(0), LinkId::new(1)],
            duplicates: vec![],
        };
        assert!(!outcome.has_duplicates());
        assert!(outcome.duplicate_error().is_none());
    }

    #[test]
    fn test_batch_put_outcome_duplicate_error() {
        let outcome = BatchPutOutcome {
            ids: vec![LinkId::new(0), LinkId::new(0)],
            duplicates: vec!["http://a.b".to_string()],
        };
        let err = outcome.duplicate_error().unwrap();
        assert!(matches!(err, UrlshrtError::DuplicateUrls(_)));
        assert_eq!(err.message(), "duplicated URL: http://a.b");
    }
}
