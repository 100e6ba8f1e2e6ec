use serde::{Deserialize, Serialize};

/// `POST /api/shorten` 请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

/// `POST /api/shorten` 响应体，`result` 为完整短链接
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

/// 批量缩短请求中的单项，`correlation_id` 原样回显
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchShortenRequestItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShortenResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

/// `GET /api/user/urls` 响应中的单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlsByUserResponseItem {
    pub short_url: String,
    pub original_url: String,
}
