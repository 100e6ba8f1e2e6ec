use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 应用配置（从 TOML + 环境变量 + 命令行加载，启动时使用）
///
/// 包含：
/// - server: 监听地址、端口、短链接前缀
/// - storage: 存储后端选择（数据库 URL 或快照文件）
/// - deletion: 批量删除管道参数
/// - auth: JWT Cookie 密钥
/// - audit: 审计事件输出
/// - logging: 日志配置
///
/// 配置通过构造参数显式传递给各组件，不存在全局单例。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值（命令行参数随后由 `CliArgs::apply_to` 覆盖）
    /// ENV 前缀：URLSHRT，分隔符：__
    /// 示例：URLSHRT__STORAGE__DATABASE_URL=sqlite://links.db
    ///
    /// 文件不存在时只用环境变量和默认值；文件或环境变量格式错误时返回错误，不回退到默认配置。
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let config = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 URLSHRT，分隔符 __
            .add_source(
                Environment::with_prefix("URLSHRT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<AppConfig>()?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 短链接前缀，例如 http://localhost:8080
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 存储配置
///
/// `database_url` 非空时使用关系型存储，否则使用内存存储，
/// `file_storage_path` 非空时启用快照持久化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_url: String,
    #[serde(default)]
    pub file_storage_path: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 批量删除管道配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// 达到该数量立即刷盘
    #[serde(default = "default_delete_batch_size")]
    pub batch_size: usize,
    /// 首个请求到达后最长等待时间
    #[serde(default = "default_delete_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

impl DeletionConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT HS256 密钥，为空时启动时随机生成
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// 审计配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_delete_batch_size() -> usize {
    10
}

fn default_delete_batch_timeout_ms() -> u64 {
    1000
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            base_url: default_base_url(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            file_storage_path: String::new(),
            pool_size: default_database_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_delete_batch_size(),
            batch_timeout_ms: default_delete_batch_timeout_ms(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            cookie_name: default_cookie_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.base_url, "http://localhost:8080");
        assert!(config.storage.database_url.is_empty());
        assert!(config.storage.file_storage_path.is_empty());
        assert_eq!(config.deletion.batch_size, 10);
        assert_eq!(config.deletion.batch_timeout(), Duration::from_secs(1));
        assert_eq!(config.auth.cookie_name, "token");
        assert!(config.audit.file.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml_from_str(
            r#"
            [storage]
            file_storage_path = "/tmp/links.json"

            [deletion]
            batch_size = 3
            "#,
        );
        assert_eq!(config.storage.file_storage_path, "/tmp/links.json");
        assert_eq!(config.deletion.batch_size, 3);
        assert_eq!(config.deletion.batch_timeout_ms, 1000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.deletion.batch_size, 10);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[deletion]\nbatch_size = 4\n").unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.deletion.batch_size, 4);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\ndatabase_url = ").unwrap();
        assert!(AppConfig::load(path.to_str()).is_err());

        std::fs::write(&path, "[deletion]\nbatch_size = \"many\"\n").unwrap();
        assert!(AppConfig::load(path.to_str()).is_err());
    }

    fn toml_from_str(s: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
