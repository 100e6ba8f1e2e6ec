//! 批量删除管道
//!
//! 删除请求先进入有界队列，由单个后台任务攒批后一次性写入存储：
//! - 缓冲数量达到 `batch_size` 立即刷盘
//! - 首个请求到达后 `batch_timeout` 到期刷盘
//! - 关闭时排空队列并刷盘
//!
//! 刷盘失败只记录日志，批次被丢弃（至多一次）。

mod pipeline;
mod sink;

pub use pipeline::DeletePipeline;
pub use sink::{DeleteReport, DeleteSink};
