use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Shorten,
    Follow,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shorten => write!(f, "shorten"),
            Self::Follow => write!(f, "follow"),
        }
    }
}

/// 审计事件（JSON 行格式写入文件或 POST 到远端）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unix 时间戳（秒）
    pub ts: i64,
    pub action: AuditAction,
    pub user_id: UserId,
    pub url: String,
}

impl AuditEvent {
    pub fn now(action: AuditAction, user_id: UserId, url: impl Into<String>) -> Self {
        Self {
            ts: chrono::Utc::now().timestamp(),
            action,
            user_id,
            url: url.into(),
        }
    }
}
