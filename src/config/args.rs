//! Command-line argument parsing
//!
//! Flags override values loaded from the TOML file and the environment.

use clap::Parser;

use super::AppConfig;

/// urlshrt - URL shortener service
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "urlshrt")]
#[command(version)]
#[command(about = "URL shortener with per-user links and batched deletion", long_about = None)]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Address to listen on, e.g. ":8080" or "127.0.0.1:8080"
    #[arg(short = 'a', long = "address")]
    pub listen_addr: Option<String>,

    /// Prefix for shortened URLs
    #[arg(short = 'b', long = "base-url")]
    pub base_url: Option<String>,

    /// Snapshot file for the in-memory store
    #[arg(short = 'f', long = "file-storage-path")]
    pub file_storage_path: Option<String>,

    /// Database connection string; selects the relational store when set
    #[arg(short = 'd', long = "database-dsn")]
    pub database_url: Option<String>,

    /// Append audit events to this file
    #[arg(long)]
    pub audit_file: Option<String>,

    /// POST audit events to this URL
    #[arg(long)]
    pub audit_url: Option<String>,

    /// Flush deletions once this many requests are buffered
    #[arg(long)]
    pub delete_batch_size: Option<usize>,

    /// Flush buffered deletions after this many milliseconds
    #[arg(long)]
    pub delete_batch_timeout_ms: Option<u64>,
}

impl CliArgs {
    /// 将命令行参数覆盖到配置上
    pub fn apply_to(&self, config: &mut AppConfig) -> Result<(), String> {
        if let Some(addr) = &self.listen_addr {
            let (host, port) = parse_listen_addr(addr)?;
            config.server.host = host;
            config.server.port = port;
        }
        if let Some(base_url) = &self.base_url {
            config.server.base_url = base_url.clone();
        }
        if let Some(path) = &self.file_storage_path {
            config.storage.file_storage_path = path.clone();
        }
        if let Some(url) = &self.database_url {
            config.storage.database_url = url.clone();
        }
        if let Some(file) = &self.audit_file {
            config.audit.file = Some(file.clone());
        }
        if let Some(url) = &self.audit_url {
            config.audit.url = Some(url.clone());
        }
        if let Some(size) = self.delete_batch_size {
            if size == 0 {
                return Err("delete batch size must be at least 1".to_string());
            }
            config.deletion.batch_size = size;
        }
        if let Some(ms) = self.delete_batch_timeout_ms {
            config.deletion.batch_timeout_ms = ms;
        }
        Ok(())
    }
}

/// 解析 `host:port`，host 为空时监听所有地址
pub fn parse_listen_addr(addr: &str) -> Result<(String, u16), String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid listen address '{}': expected host:port", addr))?;

    let port = port
        .parse::<u16>()
        .map_err(|e| format!("Invalid port in listen address '{}': {}", addr, e))?;

    let host = if host.is_empty() {
        "0.0.0.0".to_string()
    } else {
        host.to_string()
    };

    Ok((host, port))
}
