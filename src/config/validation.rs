//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Validate addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RpcConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RpcConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &RpcConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();
    let mut check = |ok: bool, field: &'static str, message: String| {
        if !ok {
            issues.push(ConfigIssue { field, message });
        }
    };

    check(
        config.server.bind_address.parse::<SocketAddr>().is_ok(),
        "server.bind_address",
        format!("\"{}\" is not a socket address", config.server.bind_address),
    );
    check(
        config.server.request_timeout_secs > 0,
        "server.request_timeout_secs",
        "must be greater than 0".into(),
    );
    check(
        config.server.max_body_size > 0,
        "server.max_body_size",
        "must be greater than 0".into(),
    );
    check(
        config.server.max_connections > 0,
        "server.max_connections",
        "must be greater than 0".into(),
    );
    check(
        config.uploads.max_file_size > 0,
        "uploads.max_file_size",
        "must be greater than 0".into(),
    );
    check(
        config.uploads.max_text_field_size > 0,
        "uploads.max_text_field_size",
        "must be greater than 0".into(),
    );
    check(
        url::Url::parse(&config.client.url).is_ok(),
        "client.url",
        format!("\"{}\" is not a valid URL", config.client.url),
    );
    check(
        config.client.max_batch_size > 0,
        "client.max_batch_size",
        "must be greater than 0".into(),
    );
    check(
        config.client.request_timeout_secs > 0,
        "client.request_timeout_secs",
        "must be greater than 0".into(),
    );
    check(
        config.retries.max_attempts > 0,
        "retries.max_attempts",
        "must be at least 1".into(),
    );
    check(
        config.retries.base_delay_ms <= config.retries.max_delay_ms,
        "retries.base_delay_ms",
        "must not exceed retries.max_delay_ms".into(),
    );
    if config.observability.metrics_enabled {
        check(
            config.observability.metrics_address.parse::<SocketAddr>().is_ok(),
            "observability.metrics_address",
            format!(
                "\"{}\" is not a socket address",
                config.observability.metrics_address
            ),
        );
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RpcConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_issue() {
        let mut config = RpcConfig::default();
        config.server.bind_address = "nowhere".into();
        config.client.url = "not a url".into();
        config.retries.max_attempts = 0;

        let issues = validate_config(&config).unwrap_err();
        let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec!["server.bind_address", "client.url", "retries.max_attempts"]
        );
    }
}
