//! 审计通知
//!
//! 服务层在缩短和跳转时发出 [`AuditEvent`]，分发给所有订阅者：
//! - `FileAudit`: 追加 JSON 行到文件
//! - `HttpAudit`: POST JSON 到远端
//!
//! 分发在后台任务中进行，投递失败只记录日志，不影响调用方。

mod file;
mod http;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::config::AuditConfig;
use crate::errors::Result;
use crate::model::AuditEvent;

pub use file::FileAudit;
pub use http::HttpAudit;

/// 审计订阅者
#[async_trait]
pub trait AuditSubscriber: Send + Sync {
    async fn notify(&self, event: &AuditEvent) -> Result<()>;

    /// 订阅者名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 审计事件分发器
#[derive(Clone, Default)]
pub struct AuditNotifier {
    subscribers: Vec<Arc<dyn AuditSubscriber>>,
}

impl AuditNotifier {
    pub fn new(subscribers: Vec<Arc<dyn AuditSubscriber>>) -> Self {
        Self { subscribers }
    }

    /// 根据配置创建订阅者；文件无法打开时返回错误
    pub async fn from_config(config: &AuditConfig) -> Result<Self> {
        let mut subscribers: Vec<Arc<dyn AuditSubscriber>> = Vec::new();

        if let Some(path) = config.file.as_deref().filter(|p| !p.is_empty()) {
            subscribers.push(Arc::new(FileAudit::open(path).await?));
            debug!("Audit: writing events to file {}", path);
        }
        if let Some(url) = config.url.as_deref().filter(|u| !u.is_empty()) {
            subscribers.push(Arc::new(HttpAudit::new(url)));
            debug!("Audit: posting events to {}", url);
        }

        Ok(Self { subscribers })
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// 后台投递，立即返回
    pub fn notify(&self, event: AuditEvent) {
        if self.subscribers.is_empty() {
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.deliver(&event).await;
        });
    }

    /// 依次投递给所有订阅者并等待完成，失败只记录日志
    pub async fn deliver(&self, event: &AuditEvent) {
        for subscriber in &self.subscribers {
            match subscriber.notify(event).await {
                Ok(()) => trace!("Audit: {} event delivered to {}", event.action, subscriber.name()),
                Err(e) => warn!(
                    "Audit: failed to deliver {} event to {}: {}",
                    event.action,
                    subscriber.name(),
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UrlshrtError;
    use crate::model::{AuditAction, UserId};
    use std::sync::Mutex;

    struct Recorder {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSubscriber for Recorder {
        async fn notify(&self, event: &AuditEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Broken;

    #[async_trait]
    impl AuditSubscriber for Broken {
        async fn notify(&self, _event: &AuditEvent) -> Result<()> {
            Err(UrlshrtError::audit_delivery("endpoint down"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        });
        let notifier = AuditNotifier::new(vec![
            Arc::new(Broken),
            Arc::clone(&recorder) as Arc<dyn AuditSubscriber>,
        ]);

        let event = AuditEvent::now(AuditAction::Shorten, UserId::new(1), "http://a.com");
        notifier.deliver(&event).await;

        assert_eq!(recorder.events.lock().unwrap().as_slice(), &[event]);
    }

    #[tokio::test]
    async fn test_from_empty_config() {
        let notifier = AuditNotifier::from_config(&AuditConfig::default())
            .await
            .unwrap();
        assert!(notifier.is_empty());
    }
}
