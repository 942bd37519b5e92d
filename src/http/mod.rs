//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → server.rs (router, request-id, trace, timeout layers)
//!     → middleware.rs (context extraction → gateway.validate)
//!     → admitted handler | 403/429 verdict response
//!
//! Operator request:
//!     → admin router (bearer auth, bypasses validation)
//! ```

pub mod middleware;
pub mod server;

pub use server::HttpServer;
