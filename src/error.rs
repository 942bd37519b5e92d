//! Gateway error taxonomy.
//!
//! Security denials are NOT errors: they are typed verdicts returned from
//! the validation pipeline. This enum covers operator/configuration
//! failures surfaced through the admin API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Policy update referenced an id that does not exist.
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    /// Threat pattern update referenced an id that does not exist.
    #[error("unknown threat pattern: {0}")]
    UnknownPattern(String),

    /// A threat signature failed to compile as a regular expression.
    #[error("invalid threat signature: {0}")]
    InvalidSignature(String),

    /// Audit export serialization failure.
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}
