// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and coherent
//! backoff bounds. All errors are collected rather than failing fast.

use crate::error::ConfigError;
use crate::model::RoostConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors.
pub fn validate_config(config: &RoostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ConfigError::validation("server.name must not be empty"));
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.session.command_prefix.is_empty() {
        errors.push(ConfigError::validation(
            "session.command_prefix must not be empty",
        ));
    }

    if config.session.reconnect_base_secs == 0 {
        errors.push(ConfigError::validation(
            "session.reconnect_base_secs must be at least 1",
        ));
    }

    if config.session.reconnect_cap_secs < config.session.reconnect_base_secs {
        errors.push(ConfigError::validation(format!(
            "session.reconnect_cap_secs ({}) must not be below reconnect_base_secs ({})",
            config.session.reconnect_cap_secs, config.session.reconnect_base_secs
        )));
    }

    if config.features.scratch_max_bytes == 0 {
        errors.push(ConfigError::validation(
            "features.scratch_max_bytes must be positive",
        ));
    }

    // Peer names must not collide with this server's own name, and URLs
    // must look like HTTP(S) base URLs.
    for (peer, url) in &config.server.peers {
        if peer == &config.server.name {
            errors.push(ConfigError::validation(format!(
                "server.peers must not contain this server's own name `{peer}`"
            )));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "server.peers.{peer} `{url}` must be an http(s) base URL"
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = RoostConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_server_name_fails() {
        let mut config = RoostConfig::default();
        config.server.name = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("server.name")));
    }

    #[test]
    fn empty_database_path_fails() {
        let mut config = RoostConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("database_path"))
        );
    }

    #[test]
    fn cap_below_base_fails() {
        let mut config = RoostConfig::default();
        config.session.reconnect_base_secs = 60;
        config.session.reconnect_cap_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("reconnect_cap_secs"))
        );
    }

    #[test]
    fn self_referential_peer_fails() {
        let mut config = RoostConfig::default();
        config.server.name = "S1".to_string();
        config
            .server
            .peers
            .insert("S1".to_string(), "http://localhost:1".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("own name")));
    }

    #[test]
    fn non_http_peer_url_fails() {
        let mut config = RoostConfig::default();
        config
            .server
            .peers
            .insert("S2".to_string(), "s2.internal:8420".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("base URL")));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = RoostConfig::default();
        config.server.name = "".to_string();
        config.storage.database_path = "".to_string();
        config.session.command_prefix = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
