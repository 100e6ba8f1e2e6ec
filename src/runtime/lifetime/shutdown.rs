use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::storage::LinkStore;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C 或 SIGTERM
pub async fn listen_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, flushing pending deletions...");
}

/// 排空删除管道（在超时内完成）
pub async fn perform_shutdown_tasks(store: &dyn LinkStore) {
    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), store.shutdown()).await {
        Ok(()) => {
            info!("{} store shut down cleanly", store.backend_name());
        }
        Err(_) => {
            error!(
                "Store shutdown timed out after {} seconds, pending deletions may be lost",
                SHUTDOWN_TIMEOUT_SECS
            );
        }
    }
}
