use actix_web::{HttpResponse, Responder, web};
use std::time::{Duration, Instant};
use tracing::{error, trace};

use crate::services::LinkService;

/// Health Service
pub struct HealthService;

impl HealthService {
    /// `GET /ping`: 200 when the storage backend answers, 500 otherwise
    pub async fn ping(links: web::Data<LinkService>) -> impl Responder {
        let start_time = Instant::now();
        let backend = links.store().backend_name().to_string();

        match tokio::time::timeout(Duration::from_secs(5), links.ping()).await {
            Ok(Ok(())) => {
                trace!(
                    "Ping to {} storage succeeded in {:?}",
                    backend,
                    start_time.elapsed()
                );
                HttpResponse::Ok()
                    .append_header(("Content-Type", "text/plain"))
                    .body("OK")
            }
            Ok(Err(e)) => {
                error!("Ping to {} storage failed: {}", backend, e);
                HttpResponse::InternalServerError().finish()
            }
            Err(_) => {
                error!("Ping to {} storage timed out", backend);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

/// Health 路由配置
pub fn health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(HealthService::ping));
}
