// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error type and terminal rendering.

use thiserror::Error;

/// An error produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML/env sources failed to parse or extract.
    #[error("config parse error: {message}")]
    Parse { message: String },

    /// A semantic validation failed after deserialization.
    #[error("config validation error: {message}")]
    Validation { message: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

/// Render collected config errors to stderr, one per line.
pub fn render_errors(errors: &[ConfigError]) {
    eprintln!("roost: configuration is invalid ({} error(s))", errors.len());
    for err in errors {
        eprintln!("  - {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_constructor_and_display() {
        let err = ConfigError::validation("server.name must not be empty");
        assert!(err.to_string().contains("server.name"));
    }

    #[test]
    fn parse_error_display() {
        let err = ConfigError::Parse {
            message: "unexpected key".to_string(),
        };
        assert!(err.to_string().contains("unexpected key"));
    }
}
