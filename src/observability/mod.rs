//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing spans/events (structured fields: principal, origin,
//!       request_id)
//!     → metrics.rs counters and gauges
//!
//! Consumers:
//!     → Log aggregation (stdout JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap (atomic increments)
//! - Observability failures degrade silently, never the request path

pub mod logging;
pub mod metrics;
