//! Security validation pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request context:
//!     → orchestrator.rs (blocked-origin check)
//!     → rate_limit.rs (per principal+origin window)
//!     → threat.rs (signature scan, first match wins)
//!     → anomaly.rs (deviation vs principal history)
//!     → policy.rs (priority-ordered rules)
//!     → Verdict {allow | deny 403/429}
//!
//! Every deny and every monitor/alert crossing → audit trail
//! ```
//!
//! # Design Decisions
//! - Fail closed on the decision path, fail open on observability
//! - Denials are typed verdicts, never errors
//! - All shared tables owned by one gateway instance, no globals

pub mod anomaly;
pub mod context;
pub mod orchestrator;
pub mod policy;
pub mod rate_limit;
pub mod sweeper;
pub mod threat;

pub use context::{EventCategory, SecurityContext, SecurityEvent, Severity};
pub use orchestrator::{SecurityGateway, Verdict};
