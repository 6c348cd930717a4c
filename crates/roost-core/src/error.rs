// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Roost bot fleet.

use thiserror::Error;

/// The primary error type used across Roost trait boundaries and core operations.
///
/// Several variants describe *expected* outcomes rather than defects:
/// [`FleetError::RegistryConflict`] is the normal result of losing a
/// registration race, [`FleetError::LockContention`] means a duplicate
/// invocation was dropped, and [`FleetError::MediaUnrecoverable`] means the
/// transport already consumed a single-view payload.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Credential blob failed to load or decode. Fatal for the session:
    /// the bot enters `error` status and is never auto-retried.
    #[error("credential invalid: {0}")]
    CredentialInvalid(String),

    /// Transport failures (connection drop, send failure, protocol error).
    /// Transient by classification; the session retries via backoff.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation exceeded its deadline. Returned to the caller typed,
    /// never retried internally.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The external identity is already owned by another server.
    #[error("identity {identity} already registered on {owner}")]
    RegistryConflict { identity: String, owner: String },

    /// Single-view media could not be recovered because the transport
    /// already consumed it. Expected, informational.
    #[error("media for message {message_id} is unrecoverable")]
    MediaUnrecoverable { message_id: String },

    /// A live execution lock exists for this (bot, command) pair; the
    /// duplicate invocation is silently dropped by the caller.
    #[error("command {command} already executing on bot {bot_id}")]
    LockContention { bot_id: String, command: String },

    /// A cross-server relay call failed (network error or non-success status).
    #[error("relay error: {message}")]
    Relay {
        message: String,
        status: Option<u16>,
    },

    /// The bot is not approved (or its approval expired); refused to start.
    #[error("bot {bot_id} is not approved: {reason}")]
    Unapproved { bot_id: String, reason: String },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Shorthand for a [`FleetError::NotFound`].
    pub fn not_found(kind: &str, id: &str) -> Self {
        FleetError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// True for variants that describe an expected, locally-handled outcome
    /// rather than a failure that should surface as a persisted error status.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            FleetError::RegistryConflict { .. }
                | FleetError::MediaUnrecoverable { .. }
                | FleetError::LockContention { .. }
        )
    }

    /// True for failures that require operator action and must never be
    /// auto-retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FleetError::CredentialInvalid(_))
    }
}
