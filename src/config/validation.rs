//! Semantic validation of loaded configuration.

use crate::config::schema::GatewayConfig;

/// A single validation failure, keyed by the offending field.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: &str| {
        errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    };

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        fail("listener.bind_address", "not a valid socket address");
    }
    if config.rate_limit.window_ms == 0 {
        fail("rate_limit.window_ms", "must be greater than zero");
    }
    if !(0.0..=1.0).contains(&config.anomaly.high_risk_threshold) {
        fail("anomaly.high_risk_threshold", "must be within [0, 1]");
    }
    if config.anomaly.max_history == 0 {
        fail("anomaly.max_history", "must be greater than zero");
    }
    if config.auth_failures.window_secs == 0 {
        fail("auth_failures.window_secs", "must be greater than zero");
    }
    if config.sessions.idle_timeout_secs == 0 {
        fail("sessions.idle_timeout_secs", "must be greater than zero");
    }
    if config.audit.retention_days <= 0 {
        fail("audit.retention_days", "must be greater than zero");
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        fail("admin.api_key", "required when the admin API is enabled");
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        fail("observability.metrics_address", "not a valid socket address");
    }
    if !config.threat_intel.feed_url.is_empty()
        && !config.threat_intel.feed_url.starts_with("http")
    {
        fail("threat_intel.feed_url", "must be an http(s) URL");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold_and_address() {
        let mut config = GatewayConfig::default();
        config.anomaly.high_risk_threshold = 1.5;
        config.listener.bind_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
