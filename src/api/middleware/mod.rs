pub mod auth;
pub mod logging;

pub use auth::CookieAuth;
pub use logging::RequestLogging;
