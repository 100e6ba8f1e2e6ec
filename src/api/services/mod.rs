pub mod health;
pub mod links;

pub use health::{HealthService, health_routes};
pub use links::{LinkHandlers, link_routes};
