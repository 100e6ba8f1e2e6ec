use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, Span, debug, error, info, trace, warn};

use super::DeleteSink;
use crate::config::DeletionConfig;
use crate::errors::{Result, UrlshrtError};
use crate::model::DeleteRequest;

/// 批量删除管道
///
/// 提交方只负责入队，物理删除由后台任务完成。
/// 每个管道只有一个 worker，状态完全封装在 worker 内部。
pub struct DeletePipeline {
    sender: mpsc::Sender<DeleteRequest>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl DeletePipeline {
    /// 启动管道 worker，必须在 tokio runtime 内调用
    ///
    /// worker 在传入的 `span` 下运行，日志继承调用方上下文。
    pub fn spawn(sink: Arc<dyn DeleteSink>, config: DeletionConfig, span: Span) -> Self {
        let batch_size = config.batch_size.max(1);
        let (sender, receiver) = mpsc::channel(batch_size);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            receiver,
            shutdown_rx,
            sink,
            batch_size,
            batch_timeout: config.batch_timeout(),
            batch: Vec::with_capacity(batch_size),
        };
        let handle = tokio::spawn(worker.run().instrument(span));

        debug!(
            "DeletePipeline: started (batch_size={}, batch_timeout={:?})",
            batch_size,
            config.batch_timeout()
        );

        Self {
            sender,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        }
    }

    /// 提交删除请求，不等待物理删除完成
    ///
    /// 队列满时等待 worker 消费；仅在关闭后返回 `PipelineClosed`。
    pub async fn submit(&self, requests: Vec<DeleteRequest>) -> Result<()> {
        for request in requests {
            if self.closed.load(Ordering::Acquire) {
                return Err(closed_error());
            }
            self.sender.send(request).await.map_err(|_| closed_error())?;
            trace!(
                "DeletePipeline: queued delete of {} for user {}",
                request.link_id, request.owner
            );
        }
        Ok(())
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 关闭管道：刷出所有待处理请求并等待 worker 退出（幂等）
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("DeletePipeline: worker terminated abnormally: {}", e);
            } else {
                info!("DeletePipeline: stopped");
            }
        }
    }
}

fn closed_error() -> UrlshrtError {
    UrlshrtError::pipeline_closed("deletion pipeline has been shut down")
}

/// 后台 worker 状态
///
/// - Idle: `batch` 为空，无定时器
/// - Accumulating: `batch` 非空，定时器在首个请求到达时设定，新请求不会延长它
struct Worker {
    receiver: mpsc::Receiver<DeleteRequest>,
    shutdown_rx: oneshot::Receiver<()>,
    sink: Arc<dyn DeleteSink>,
    batch_size: usize,
    batch_timeout: std::time::Duration,
    batch: Vec<DeleteRequest>,
}

impl Worker {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                // 关闭信号（发送端被丢弃同样视为关闭）
                _ = &mut self.shutdown_rx => {
                    debug!("DeletePipeline: shutdown signal received");
                    break;
                }

                received = self.receiver.recv() => {
                    let Some(request) = received else {
                        debug!("DeletePipeline: all submitters dropped");
                        break;
                    };

                    if self.batch.is_empty() {
                        deadline = Some(Instant::now() + self.batch_timeout);
                    }
                    self.batch.push(request);

                    if self.batch.len() >= self.batch_size {
                        trace!("DeletePipeline: batch size reached, flushing");
                        self.flush().await;
                        deadline = None;
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    trace!("DeletePipeline: batch timeout elapsed, flushing");
                    self.flush().await;
                    deadline = None;
                }
            }
        }

        self.drain().await;
    }

    /// 停止接收新请求，把队列中剩余请求按批刷出
    async fn drain(&mut self) {
        self.receiver.close();

        while let Ok(request) = self.receiver.try_recv() {
            self.batch.push(request);
            if self.batch.len() >= self.batch_size {
                self.flush().await;
            }
        }
        self.flush().await;
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            trace!("DeletePipeline: nothing to flush");
            return;
        }

        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        let count = batch.len();

        match self.sink.apply_deletes(batch).await {
            Ok(report) => {
                if report.rejected > 0 {
                    warn!(
                        "DeletePipeline: flushed {} requests, {} applied, {} rejected",
                        count, report.applied, report.rejected
                    );
                } else {
                    debug!(
                        "DeletePipeline: flushed {} requests, {} applied",
                        count, report.applied
                    );
                }
            }
            Err(e) => {
                // 至多一次：失败的批次直接丢弃
                let err = UrlshrtError::pipeline_apply_failure(format!(
                    "{} delete requests dropped: {}",
                    count, e
                ));
                error!("DeletePipeline: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkId, UserId};
    use crate::storage::deletion::DeleteReport;
    use async_trait::async_trait;
    use std::time::Duration;

    struct MockSink {
        batches: std::sync::Mutex<Vec<Vec<DeleteRequest>>>,
        fail: AtomicBool,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                batches: std::sync::Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(|b| b.len()).collect()
        }

        fn total(&self) -> usize {
            self.batch_sizes().iter().sum()
        }
    }

    #[async_trait]
    impl DeleteSink for MockSink {
        async fn apply_deletes(&self, batch: Vec<DeleteRequest>) -> anyhow::Result<DeleteReport> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("transaction aborted");
            }
            let applied = batch.len();
            self.batches.lock().unwrap().push(batch);
            Ok(DeleteReport {
                applied,
                rejected: 0,
            })
        }
    }

    fn request(id: u64) -> DeleteRequest {
        DeleteRequest::new(UserId::new(1), LinkId::new(id))
    }

    fn pipeline(sink: &Arc<MockSink>, batch_size: usize, timeout_ms: u64) -> DeletePipeline {
        DeletePipeline::spawn(
            Arc::clone(sink) as Arc<dyn DeleteSink>,
            DeletionConfig {
                batch_size,
                batch_timeout_ms: timeout_ms,
            },
            Span::none(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_batch_size() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 3, 1000);

        pipeline
            .submit(vec![request(1), request(2), request(3)])
            .await
            .unwrap();

        // 远小于超时时间
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.batch_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_timeout_below_threshold() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 10, 1000);

        pipeline.submit(vec![request(1)]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(sink.batch_sizes().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.batch_sizes(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_not_extended_by_new_requests() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 10, 1000);

        pipeline.submit(vec![request(1)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        pipeline.submit(vec![request(2)]).await.unwrap();

        // t = 1100ms：定时器按首个请求的时间触发
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_one_flushes_immediately() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 1, 60_000);

        pipeline.submit(vec![request(1), request(2)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(sink.batch_sizes(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_pending() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 10, 60_000);

        pipeline
            .submit(vec![request(1), request(2), request(3)])
            .await
            .unwrap();
        pipeline.shutdown().await;

        assert_eq!(sink.total(), 3);
        assert!(pipeline.is_closed());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 10, 1000);

        pipeline.shutdown().await;
        // 幂等
        pipeline.shutdown().await;

        let err = pipeline.submit(vec![request(1)]).await.unwrap_err();
        assert!(matches!(err, UrlshrtError::PipelineClosed(_)));
        assert_eq!(sink.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_dropped() {
        let sink = Arc::new(MockSink::new());
        let pipeline = pipeline(&sink, 2, 1000);

        sink.fail.store(true, Ordering::SeqCst);
        pipeline.submit(vec![request(1), request(2)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.total(), 0);

        // 失败后 worker 仍可继续工作，且失败批次不会重试
        sink.fail.store(false, Ordering::SeqCst);
        pipeline.submit(vec![request(3), request(4)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.batch_sizes(), vec![2]);

        let flushed: Vec<u64> = sink.batches.lock().unwrap()[0]
            .iter()
            .map(|r| r.link_id.get())
            .collect();
        assert_eq!(flushed, vec![3, 4]);
    }

    /// 并发提交不会丢失请求
    #[tokio::test]
    async fn test_concurrent_submitters() {
        let sink = Arc::new(MockSink::new());
        let pipeline = Arc::new(pipeline(&sink, 4, 50));

        const NUM_TASKS: u64 = 8;
        const PER_TASK: u64 = 25;

        let mut handles = vec![];
        for t in 0..NUM_TASKS {
            let p = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                for i in 0..PER_TASK {
                    p.submit(vec![request(t * PER_TASK + i)]).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        pipeline.shutdown().await;
        assert_eq!(sink.total(), (NUM_TASKS * PER_TASK) as usize);
        assert!(sink.batch_sizes().iter().all(|&n| n <= 4));
    }
}
