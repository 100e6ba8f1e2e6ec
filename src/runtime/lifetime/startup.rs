use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::jwt::JwtService;
use crate::config::AppConfig;
use crate::services::{AuditNotifier, LinkService};
use crate::storage::{LinkStore, StorageFactory};

/// 服务器启动所需的共享组件
pub struct StartupContext {
    pub store: Arc<dyn LinkStore>,
    pub link_service: Arc<LinkService>,
    pub jwt: Arc<JwtService>,
}

/// 准备服务器启动的上下文
/// 包括存储、审计订阅者和 JWT 服务
pub async fn prepare_server_startup(config: &AppConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let store = StorageFactory::create(&config.storage, config.deletion)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", store.backend_name());

    let audit = AuditNotifier::from_config(&config.audit)
        .await
        .context("Failed to initialize audit subscribers")?;
    if !audit.is_empty() {
        info!("Audit enabled with {} subscriber(s)", audit.len());
    }

    let link_service = Arc::new(LinkService::new(
        Arc::clone(&store),
        config.server.base_url.clone(),
        audit,
    ));
    let jwt = Arc::new(JwtService::from_config(&config.auth));

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        store,
        link_service,
        jwt,
    })
}
