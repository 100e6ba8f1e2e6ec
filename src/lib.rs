//! urlshrt - URL shortener service
//!
//! Shortens URLs into base36 ids, resolves them back with a redirect, keeps
//! per-user link lists and deletes links in the background through a batched
//! deletion pipeline.
//!
//! # Architecture
//! - `model`: ids, request/response types and audit events
//! - `storage`: the [`storage::LinkStore`] contract, in-memory and SeaORM backends,
//!   and the deletion pipeline
//! - `services`: link business logic and audit notification
//! - `api`: HTTP handlers, cookie authentication and error mapping
//! - `config`: TOML/env/CLI configuration
//! - `runtime`: server startup and graceful shutdown
//! - `system`: logging initialization

pub mod api;
pub mod config;
pub mod errors;
pub mod model;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
