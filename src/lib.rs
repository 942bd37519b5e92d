//! Request-time security validation and threat-detection gateway.

pub mod admin;
pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{SecurityContext, SecurityEvent, SecurityGateway, Verdict};
