// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`FleetStore`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use roost_config::model::StorageConfig;
use roost_core::FleetError;
use roost_core::traits::FleetStore;
use roost_core::types::{
    ActivityRecord, ApprovalState, BotRecord, BotStatus, ClaimOutcome, FeatureFlags,
    RegistryEntry,
};

use crate::database::Database;
use crate::queries;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// SQLite-backed fleet store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`FleetStore::initialize`]. `server_name` scopes bot listings to
/// this process's tenancy.
pub struct SqliteStore {
    config: StorageConfig,
    server_name: String,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore for the given server identity.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig, server_name: &str) -> Self {
        Self {
            config,
            server_name: server_name.to_string(),
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, FleetError> {
        self.db.get().ok_or_else(|| FleetError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl FleetStore for SqliteStore {
    async fn initialize(&self) -> Result<(), FleetError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| FleetError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), FleetError> {
        self.db()?.close().await
    }

    // --- Bot records ---

    async fn create_bot(&self, bot: &BotRecord) -> Result<(), FleetError> {
        queries::bots::create_bot(self.db()?, bot).await
    }

    async fn get_bot(&self, id: &str) -> Result<Option<BotRecord>, FleetError> {
        queries::bots::get_bot(self.db()?, id).await
    }

    async fn list_bots(
        &self,
        approval: Option<ApprovalState>,
    ) -> Result<Vec<BotRecord>, FleetError> {
        queries::bots::list_bots(self.db()?, &self.server_name, approval).await
    }

    async fn update_bot_status(&self, id: &str, status: BotStatus) -> Result<(), FleetError> {
        queries::bots::update_bot_status(self.db()?, id, status, &now_rfc3339()).await
    }

    async fn set_bot_identity(
        &self,
        id: &str,
        identity: Option<&str>,
    ) -> Result<(), FleetError> {
        queries::bots::set_bot_identity(self.db()?, id, identity, &now_rfc3339()).await
    }

    async fn set_bot_approval(
        &self,
        id: &str,
        approval: ApprovalState,
        expires_at: Option<&str>,
    ) -> Result<(), FleetError> {
        queries::bots::set_bot_approval(self.db()?, id, approval, expires_at, &now_rfc3339())
            .await
    }

    async fn set_bot_features(
        &self,
        id: &str,
        features: &FeatureFlags,
    ) -> Result<(), FleetError> {
        queries::bots::set_bot_features(self.db()?, id, features, &now_rfc3339()).await
    }

    async fn bump_bot_counters(
        &self,
        id: &str,
        messages: i64,
        commands: i64,
    ) -> Result<(), FleetError> {
        queries::bots::bump_bot_counters(self.db()?, id, messages, commands).await
    }

    async fn touch_bot_seen(&self, id: &str, at: &str) -> Result<(), FleetError> {
        queries::bots::touch_bot_seen(self.db()?, id, at).await
    }

    async fn delete_bot(&self, id: &str) -> Result<(), FleetError> {
        queries::bots::delete_bot(self.db()?, id).await
    }

    // --- Credential blobs ---

    async fn load_credential(&self, bot_id: &str) -> Result<Option<Vec<u8>>, FleetError> {
        queries::bots::load_credential(self.db()?, bot_id).await
    }

    async fn save_credential(&self, bot_id: &str, blob: &[u8]) -> Result<(), FleetError> {
        queries::bots::save_credential(self.db()?, bot_id, blob, &now_rfc3339()).await
    }

    async fn clear_credential(&self, bot_id: &str) -> Result<(), FleetError> {
        queries::bots::clear_credential(self.db()?, bot_id).await
    }

    // --- Activity log ---

    async fn append_activity(
        &self,
        bot_id: &str,
        kind: &str,
        detail: &str,
    ) -> Result<(), FleetError> {
        queries::activity::append(self.db()?, bot_id, kind, detail, &now_rfc3339()).await
    }

    async fn recent_activity(
        &self,
        bot_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, FleetError> {
        queries::activity::recent(self.db()?, bot_id, limit).await
    }

    // --- Identity registry ---

    async fn try_claim_identity(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<ClaimOutcome, FleetError> {
        queries::registry::try_claim(self.db()?, identity, server_name, &now_rfc3339()).await
    }

    async fn get_registry_entry(
        &self,
        identity: &str,
    ) -> Result<Option<RegistryEntry>, FleetError> {
        queries::registry::get_entry(self.db()?, identity).await
    }

    async fn list_registry(&self) -> Result<Vec<RegistryEntry>, FleetError> {
        queries::registry::list_entries(self.db()?).await
    }

    async fn set_registry_owner(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<(), FleetError> {
        queries::registry::set_owner(self.db()?, identity, server_name).await
    }

    async fn delete_registry_entry(&self, identity: &str) -> Result<(), FleetError> {
        queries::registry::delete_entry(self.db()?, identity).await
    }

    // --- Service config documents ---

    async fn get_service_config(
        &self,
        bot_id: &str,
        service: &str,
    ) -> Result<Option<String>, FleetError> {
        queries::service_configs::get_document(self.db()?, bot_id, service).await
    }

    async fn put_service_config(
        &self,
        bot_id: &str,
        service: &str,
        document: &str,
    ) -> Result<(), FleetError> {
        queries::service_configs::put_document(self.db()?, bot_id, service, document, &now_rfc3339())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    fn make_bot(id: &str, server: &str) -> BotRecord {
        BotRecord {
            id: id.to_string(),
            server_name: server.to_string(),
            external_identity: None,
            status: BotStatus::Offline,
            features: FeatureFlags::default(),
            messages_handled: 0,
            commands_handled: 0,
            approval: ApprovalState::Pending,
            approval_expires_at: None,
            last_seen_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(
            make_config(dir.path().join("x.db").to_str().unwrap()),
            "S1",
        );
        assert!(store.get_bot("b1").await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(
            make_config(dir.path().join("double.db").to_str().unwrap()),
            "S1",
        );
        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn full_bot_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(
            make_config(dir.path().join("life.db").to_str().unwrap()),
            "S1",
        );
        store.initialize().await.unwrap();

        store.create_bot(&make_bot("b1", "S1")).await.unwrap();
        store
            .set_bot_approval("b1", ApprovalState::Approved, None)
            .await
            .unwrap();
        store
            .update_bot_status("b1", BotStatus::Online)
            .await
            .unwrap();
        store.set_bot_identity("b1", Some("254700000000")).await.unwrap();
        store.bump_bot_counters("b1", 2, 1).await.unwrap();

        let bot = store.get_bot("b1").await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Online);
        assert_eq!(bot.approval, ApprovalState::Approved);
        assert_eq!(bot.messages_handled, 2);

        let listed = store.list_bots(Some(ApprovalState::Approved)).await.unwrap();
        assert_eq!(listed.len(), 1);

        store.append_activity("b1", "command", "ping").await.unwrap();
        let activity = store.recent_activity("b1", 10).await.unwrap();
        assert_eq!(activity.len(), 1);

        store.delete_bot("b1").await.unwrap();
        assert!(store.get_bot("b1").await.unwrap().is_none());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_bots_excludes_other_servers() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(
            make_config(dir.path().join("scope.db").to_str().unwrap()),
            "S1",
        );
        store.initialize().await.unwrap();

        store.create_bot(&make_bot("mine", "S1")).await.unwrap();
        store.create_bot(&make_bot("theirs", "S2")).await.unwrap();

        let listed = store.list_bots(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "mine");
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn registry_claims_go_through_adapter() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(
            make_config(dir.path().join("claims.db").to_str().unwrap()),
            "S1",
        );
        store.initialize().await.unwrap();

        assert_eq!(
            store.try_claim_identity("100", "S1").await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            store.try_claim_identity("100", "S2").await.unwrap(),
            ClaimOutcome::AlreadyOwned {
                owner: "S1".to_string()
            }
        );
        store.close().await.unwrap();
    }
}
