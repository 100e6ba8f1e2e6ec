use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::AuditSubscriber;
use crate::errors::{Result, UrlshrtError};
use crate::model::AuditEvent;

/// 以 JSON 行格式追加审计事件
pub struct FileAudit {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAudit {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                UrlshrtError::file_operation(format!(
                    "Failed to open audit file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSubscriber for FileAudit {
    async fn notify(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(|e| {
            UrlshrtError::audit_delivery(format!("write to {} failed: {}", self.path.display(), e))
        })?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
