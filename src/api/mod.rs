//! HTTP layer
//!
//! - `jwt`: user tokens carried in the auth cookie
//! - `middleware`: cookie authentication and request logging
//! - `services`: route handlers
//! - `error`: mapping of [`crate::errors::UrlshrtError`] to HTTP responses

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod services;

use actix_web::web;

use middleware::CookieAuth;
use services::{health_routes, link_routes};

/// 注册全部路由
///
/// `/ping` 不经过 Cookie 认证，且必须先于 `/{id}` 注册。
pub fn configure_routes(cfg: &mut web::ServiceConfig, auth: CookieAuth) {
    cfg.configure(health_routes)
        .service(web::scope("").wrap(auth).configure(link_routes));
}
