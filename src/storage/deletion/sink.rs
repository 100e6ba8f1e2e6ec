use crate::model::DeleteRequest;

/// 一次批量删除的结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// 实际标记为已删除的链接数
    pub applied: usize,
    /// 被拒绝的请求数（所有者不匹配、ID 不存在或已删除）
    pub rejected: usize,
}

impl DeleteReport {
    pub fn total(&self) -> usize {
        self.applied + self.rejected
    }
}

/// 物理删除 Sink，由各存储后端实现
///
/// 单条请求的失败只计入 `rejected`，不得中断整批；
/// 返回 `Err` 表示整批未生效（例如事务失败）。
#[async_trait::async_trait]
pub trait DeleteSink: Send + Sync {
    async fn apply_deletes(&self, batch: Vec<DeleteRequest>) -> anyhow::Result<DeleteReport>;
}
