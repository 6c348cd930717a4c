// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External-identity registration against the shared registry.
//!
//! The registry read before claiming is only an optimization that produces
//! a fast local rejection; the store's atomic insert-if-absent is the sole
//! authority on ownership. A stale pre-check can therefore never yield two
//! owners: both racers fall through to the claim and the datastore picks
//! exactly one winner.

use std::sync::Arc;

use tracing::{debug, info};

use roost_core::FleetError;
use roost_core::traits::FleetStore;
use roost_core::types::{ClaimOutcome, RegistryEntry};

/// Claims and manages external identities for one server process.
pub struct IdentityRegistry {
    store: Arc<dyn FleetStore>,
    server_name: String,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn FleetStore>, server_name: &str) -> Self {
        Self {
            store,
            server_name: server_name.to_string(),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Register `identity` for `bot_id` on this server.
    ///
    /// Re-registering an identity this server already owns is idempotent.
    /// Losing to (or finding) another owner returns
    /// [`FleetError::RegistryConflict`] naming that owner so the caller can
    /// redirect.
    pub async fn register(&self, bot_id: &str, identity: &str) -> Result<(), FleetError> {
        // Fast local rejection; never authoritative.
        if let Some(entry) = self.store.get_registry_entry(identity).await?
            && entry.server_name != self.server_name
        {
            debug!(identity, owner = %entry.server_name, "pre-check found another owner");
            return Err(FleetError::RegistryConflict {
                identity: identity.to_string(),
                owner: entry.server_name,
            });
        }

        match self
            .store
            .try_claim_identity(identity, &self.server_name)
            .await?
        {
            ClaimOutcome::Claimed => {
                info!(identity, bot_id, "identity claimed");
                self.store
                    .append_activity(bot_id, "registry", &format!("claimed {identity}"))
                    .await?;
            }
            ClaimOutcome::AlreadyOwned { owner } if owner == self.server_name => {
                debug!(identity, bot_id, "identity already ours");
            }
            ClaimOutcome::AlreadyOwned { owner } => {
                return Err(FleetError::RegistryConflict {
                    identity: identity.to_string(),
                    owner,
                });
            }
        }

        self.store.set_bot_identity(bot_id, Some(identity)).await
    }

    /// Owning server for an identity, if registered.
    pub async fn owner_of(&self, identity: &str) -> Result<Option<String>, FleetError> {
        Ok(self
            .store
            .get_registry_entry(identity)
            .await?
            .map(|entry| entry.server_name))
    }

    pub async fn list(&self) -> Result<Vec<RegistryEntry>, FleetError> {
        self.store.list_registry().await
    }

    /// Manual reassignment. Changes future lookups only; the bot record and
    /// credential are not migrated to the new owner.
    pub async fn reassign(&self, identity: &str, new_owner: &str) -> Result<(), FleetError> {
        self.store.set_registry_owner(identity, new_owner).await
    }

    pub async fn unregister(&self, identity: &str) -> Result<(), FleetError> {
        self.store.delete_registry_entry(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_core::types::{ApprovalState, BotRecord, BotStatus, FeatureFlags};
    use roost_test_utils::MemoryStore;

    fn make_bot(id: &str, server: &str) -> BotRecord {
        BotRecord {
            id: id.to_string(),
            server_name: server.to_string(),
            external_identity: None,
            status: BotStatus::Offline,
            features: FeatureFlags::default(),
            messages_handled: 0,
            commands_handled: 0,
            approval: ApprovalState::Approved,
            approval_expires_at: None,
            last_seen_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn first_registration_wins_and_links_the_bot() {
        let store = Arc::new(MemoryStore::new("S1"));
        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        let registry = IdentityRegistry::new(store.clone(), "S1");

        registry.register("b1", "254700000000").await.unwrap();

        assert_eq!(
            registry.owner_of("254700000000").await.unwrap().as_deref(),
            Some("S1")
        );
        assert_eq!(
            store
                .get_bot("b1")
                .await
                .unwrap()
                .unwrap()
                .external_identity
                .as_deref(),
            Some("254700000000")
        );
    }

    #[tokio::test]
    async fn second_server_gets_conflict_naming_the_winner() {
        let store = Arc::new(MemoryStore::new("S1"));
        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        store.create_bot(&make_bot("b2", "S2")).await.unwrap();

        let s1 = IdentityRegistry::new(store.clone(), "S1");
        let s2 = IdentityRegistry::new(store.clone(), "S2");

        s1.register("b1", "254700000000").await.unwrap();
        let err = s2.register("b2", "254700000000").await.unwrap_err();

        match err {
            FleetError::RegistryConflict { identity, owner } => {
                assert_eq!(identity, "254700000000");
                assert_eq!(owner, "S1");
            }
            other => panic!("expected RegistryConflict, got {other}"),
        }
        // The loser's bot is left unlinked.
        assert!(
            store
                .get_bot("b2")
                .await
                .unwrap()
                .unwrap()
                .external_identity
                .is_none()
        );
    }

    #[tokio::test]
    async fn re_registration_by_the_owner_is_idempotent() {
        let store = Arc::new(MemoryStore::new("S1"));
        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        let registry = IdentityRegistry::new(store.clone(), "S1");

        registry.register("b1", "1555").await.unwrap();
        registry.register("b1", "1555").await.unwrap();
        assert_eq!(registry.owner_of("1555").await.unwrap().as_deref(), Some("S1"));
    }

    #[tokio::test]
    async fn reassign_changes_lookups_without_migrating_the_bot() {
        let store = Arc::new(MemoryStore::new("S1"));
        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        let registry = IdentityRegistry::new(store.clone(), "S1");
        registry.register("b1", "1555").await.unwrap();

        registry.reassign("1555", "S2").await.unwrap();
        assert_eq!(registry.owner_of("1555").await.unwrap().as_deref(), Some("S2"));

        // The bot record stays where it was.
        let bot = store.get_bot("b1").await.unwrap().unwrap();
        assert_eq!(bot.server_name, "S1");
        assert_eq!(bot.external_identity.as_deref(), Some("1555"));
    }

    #[tokio::test]
    async fn unregister_frees_the_identity() {
        let store = Arc::new(MemoryStore::new("S1"));
        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        store.create_bot(&make_bot("b2", "S2")).await.unwrap();
        let s1 = IdentityRegistry::new(store.clone(), "S1");
        let s2 = IdentityRegistry::new(store.clone(), "S2");

        s1.register("b1", "1555").await.unwrap();
        s1.unregister("1555").await.unwrap();
        s2.register("b2", "1555").await.unwrap();
        assert_eq!(s2.owner_of("1555").await.unwrap().as_deref(), Some("S2"));
    }
}
