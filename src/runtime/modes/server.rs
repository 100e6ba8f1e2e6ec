//! Server mode
//!
//! Configures and starts the HTTP server, then drains the store once the
//! server has stopped.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::configure_routes;
use crate::api::middleware::{CookieAuth, RequestLogging};
use crate::config::AppConfig;
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: AppConfig) -> Result<()> {
    let startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let store = Arc::clone(&startup.store);
    let link_service = startup.link_service;
    let jwt = startup.jwt;
    let cookie_name = config.auth.cookie_name.clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let links_data = web::Data::from(Arc::clone(&link_service));

    let server = HttpServer::new(move || {
        let auth = CookieAuth::new(Arc::clone(&jwt), Arc::clone(&link_service), &cookie_name);

        App::new()
            .wrap(RequestLogging)
            .wrap(Compress::default())
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .app_data(links_data.clone())
            .app_data(web::PayloadConfig::new(1024 * 1024))
            .configure(|cfg| configure_routes(cfg, auth))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .disable_signals()
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    let handle = server.handle();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown() => {
            handle.stop(true).await;
            info!("HTTP server stopped");
        }
    }

    lifetime::shutdown::perform_shutdown_tasks(store.as_ref()).await;
    Ok(())
}
