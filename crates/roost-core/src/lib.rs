// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Roost bot fleet.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Roost workspace. The transport and
//! storage collaborators are consumed through traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FleetError;
pub use types::{
    ApprovalState, BotAction, BotRecord, BotStatus, ClaimOutcome, FeatureFlags, MessageKey,
    TransportEvent,
};

pub use traits::{FleetStore, Transport, TransportConnection};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_error_has_all_taxonomy_variants() {
        // One constructor per error-taxonomy entry; a missing variant fails
        // to compile.
        let _config = FleetError::Config("test".into());
        let _storage = FleetError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _credential = FleetError::CredentialInvalid("test".into());
        let _transport = FleetError::Transport {
            message: "test".into(),
            source: None,
        };
        let _timeout = FleetError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _conflict = FleetError::RegistryConflict {
            identity: "test".into(),
            owner: "s1".into(),
        };
        let _media = FleetError::MediaUnrecoverable {
            message_id: "m1".into(),
        };
        let _lock = FleetError::LockContention {
            bot_id: "b1".into(),
            command: "ping".into(),
        };
        let _relay = FleetError::Relay {
            message: "test".into(),
            status: Some(502),
        };
        let _unapproved = FleetError::Unapproved {
            bot_id: "b1".into(),
            reason: "pending".into(),
        };
        let _not_found = FleetError::not_found("bot", "b1");
        let _internal = FleetError::Internal("test".into());
    }

    #[test]
    fn trait_objects_are_constructible() {
        // Verifies the seam traits stay object-safe.
        fn _assert_transport(_: &dyn Transport) {}
        fn _assert_connection(_: &dyn TransportConnection) {}
        fn _assert_store(_: &dyn FleetStore) {}
    }

    #[test]
    fn status_serialization_matches_storage_format() {
        let json = serde_json::to_string(&BotStatus::QrRequired).expect("should serialize");
        assert_eq!(json, "\"qr_required\"");
    }
}
