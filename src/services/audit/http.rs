use std::time::Duration;

use async_trait::async_trait;
use ureq::Agent;

use super::AuditSubscriber;
use crate::errors::{Result, UrlshrtError};
use crate::model::AuditEvent;

/// HTTP 请求超时时间
const HTTP_TIMEOUT_SECS: u64 = 5;

/// 把审计事件 POST 到远端（JSON 请求体）
pub struct HttpAudit {
    url: String,
    agent: Agent,
}

impl HttpAudit {
    pub fn new(url: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)))
            .build()
            .into();

        Self {
            url: url.to_string(),
            agent,
        }
    }
}

#[async_trait]
impl AuditSubscriber for HttpAudit {
    async fn notify(&self, event: &AuditEvent) -> Result<()> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let event = event.clone();

        // ureq 是同步客户端，放到阻塞线程池执行
        tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .send_json(&event)
                .map(|_| ())
                .map_err(|e| UrlshrtError::audit_delivery(format!("POST {} failed: {}", url, e)))
        })
        .await
        .map_err(|e| UrlshrtError::audit_delivery(format!("audit task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
