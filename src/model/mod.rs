//! 领域模型
//!
//! - `id`: 短链接序号及其 base36 文本形式
//! - `api`: HTTP 层请求/响应 DTO
//! - `audit`: 审计事件

pub mod api;
pub mod audit;
pub mod id;

pub use api::{
    BatchShortenRequestItem, BatchShortenResponseItem, ShortenRequest, ShortenResponse,
    UrlsByUserResponseItem,
};
pub use audit::{AuditAction, AuditEvent};
pub use id::{LinkId, UserId};

/// 一条待执行的删除请求，只存在于删除管道的队列/批次中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner: UserId,
    pub link_id: LinkId,
}

impl DeleteRequest {
    pub fn new(owner: UserId, link_id: LinkId) -> Self {
        Self { owner, link_id }
    }
}
