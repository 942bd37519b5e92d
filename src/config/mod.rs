//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     loader.rs (read TOML) → validation.rs → GatewayConfig
//!
//! Runtime:
//!     watcher.rs (notify) → mpsc channel → gateway tunable swap
//! ```
//!
//! # Design Decisions
//! - Every section has defaults; a missing file means a running gateway
//! - A reload that fails validation keeps the current configuration
//! - Policies and threat patterns are runtime state mutated through the
//!   admin API, not configuration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
