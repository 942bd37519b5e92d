//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     SIGINT → broadcast → server drains, sweeper loops exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
