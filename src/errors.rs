use std::fmt;

use crate::model::LinkId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlshrtError {
    /// URL 已存在（未删除），`id` 为已有链接，调用方仍可使用
    DuplicateUrl { url: String, id: LinkId },
    /// 批量写入中的重复项汇总
    DuplicateUrls(String),
    NotFound(String),
    Gone(String),
    MalformedIdentifier(String),
    OwnershipMismatch(String),
    StorageUnavailable(String),
    PipelineApplyFailure(String),
    PipelineClosed(String),
    DatabaseConfig(String),
    FileOperation(String),
    Serialization(String),
    Unauthorized(String),
    AuditDelivery(String),
}

impl UrlshrtError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            UrlshrtError::DuplicateUrl { .. } => "E001",
            UrlshrtError::DuplicateUrls(_) => "E002",
            UrlshrtError::NotFound(_) => "E003",
            UrlshrtError::Gone(_) => "E004",
            UrlshrtError::MalformedIdentifier(_) => "E005",
            UrlshrtError::OwnershipMismatch(_) => "E006",
            UrlshrtError::StorageUnavailable(_) => "E007",
            UrlshrtError::PipelineApplyFailure(_) => "E008",
            UrlshrtError::PipelineClosed(_) => "E009",
            UrlshrtError::DatabaseConfig(_) => "E010",
            UrlshrtError::FileOperation(_) => "E011",
            UrlshrtError::Serialization(_) => "E012",
            UrlshrtError::Unauthorized(_) => "E013",
            UrlshrtError::AuditDelivery(_) => "E014",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            UrlshrtError::DuplicateUrl { .. } => "Duplicate URL",
            UrlshrtError::DuplicateUrls(_) => "Duplicate URLs",
            UrlshrtError::NotFound(_) => "Resource Not Found",
            UrlshrtError::Gone(_) => "Resource Gone",
            UrlshrtError::MalformedIdentifier(_) => "Malformed Identifier",
            UrlshrtError::OwnershipMismatch(_) => "Ownership Mismatch",
            UrlshrtError::StorageUnavailable(_) => "Storage Unavailable",
            UrlshrtError::PipelineApplyFailure(_) => "Pipeline Apply Failure",
            UrlshrtError::PipelineClosed(_) => "Pipeline Closed",
            UrlshrtError::DatabaseConfig(_) => "Database Configuration Error",
            UrlshrtError::FileOperation(_) => "File Operation Error",
            UrlshrtError::Serialization(_) => "Serialization Error",
            UrlshrtError::Unauthorized(_) => "Unauthorized",
            UrlshrtError::AuditDelivery(_) => "Audit Delivery Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            UrlshrtError::DuplicateUrl { url, .. } => url,
            UrlshrtError::DuplicateUrls(msg) => msg,
            UrlshrtError::NotFound(msg) => msg,
            UrlshrtError::Gone(msg) => msg,
            UrlshrtError::MalformedIdentifier(msg) => msg,
            UrlshrtError::OwnershipMismatch(msg) => msg,
            UrlshrtError::StorageUnavailable(msg) => msg,
            UrlshrtError::PipelineApplyFailure(msg) => msg,
            UrlshrtError::PipelineClosed(msg) => msg,
            UrlshrtError::DatabaseConfig(msg) => msg,
            UrlshrtError::FileOperation(msg) => msg,
            UrlshrtError::Serialization(msg) => msg,
            UrlshrtError::Unauthorized(msg) => msg,
            UrlshrtError::AuditDelivery(msg) => msg,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }

    /// 重复写入时返回已有链接的 ID
    pub fn existing_id(&self) -> Option<LinkId> {
        match self {
            UrlshrtError::DuplicateUrl { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// 是否为可恢复的重复信号（单条或批量）
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            UrlshrtError::DuplicateUrl { .. } | UrlshrtError::DuplicateUrls(_)
        )
    }
}

impl fmt::Display for UrlshrtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for UrlshrtError {}

// 便捷的构造函数
impl UrlshrtError {
    pub fn duplicate_url<T: Into<String>>(url: T, id: LinkId) -> Self {
        UrlshrtError::DuplicateUrl {
            url: url.into(),
            id,
        }
    }

    /// 把批量写入中的所有重复 URL 合并为一个错误
    pub fn duplicate_urls<I, T>(urls: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let joined = urls
            .into_iter()
            .map(|u| format!("duplicated URL: {}", u.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        UrlshrtError::DuplicateUrls(joined)
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::NotFound(msg.into())
    }

    pub fn gone<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::Gone(msg.into())
    }

    pub fn malformed_identifier<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::MalformedIdentifier(msg.into())
    }

    pub fn ownership_mismatch<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::OwnershipMismatch(msg.into())
    }

    pub fn storage_unavailable<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::StorageUnavailable(msg.into())
    }

    pub fn pipeline_apply_failure<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::PipelineApplyFailure(msg.into())
    }

    pub fn pipeline_closed<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::PipelineClosed(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::DatabaseConfig(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::Serialization(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::Unauthorized(msg.into())
    }

    pub fn audit_delivery<T: Into<String>>(msg: T) -> Self {
        UrlshrtError::AuditDelivery(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for UrlshrtError {
    fn from(err: sea_orm::DbErr) -> Self {
        UrlshrtError::StorageUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for UrlshrtError {
    fn from(err: std::io::Error) -> Self {
        UrlshrtError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for UrlshrtError {
    fn from(err: serde_json::Error) -> Self {
        UrlshrtError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UrlshrtError>;
