// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage trait seam for the shared fleet datastore.

use async_trait::async_trait;

use crate::error::FleetError;
use crate::types::{
    ActivityRecord, ApprovalState, BotRecord, BotStatus, ClaimOutcome, FeatureFlags,
    RegistryEntry,
};

/// Persistence operations for bot records, credentials, the activity log,
/// the cross-server identity registry, and per-service config documents.
///
/// The registry operations are the only state shared between server
/// processes. [`FleetStore::try_claim_identity`] MUST be implemented as an
/// atomic insert-if-absent in the datastore itself; callers treat its
/// outcome as the sole authority on ownership.
#[async_trait]
pub trait FleetStore: Send + Sync + 'static {
    /// Initializes the backend (migrations, connection setup).
    async fn initialize(&self) -> Result<(), FleetError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), FleetError>;

    // --- Bot records ---

    async fn create_bot(&self, bot: &BotRecord) -> Result<(), FleetError>;

    async fn get_bot(&self, id: &str) -> Result<Option<BotRecord>, FleetError>;

    /// List bots owned by this process's server, optionally filtered by
    /// approval state.
    async fn list_bots(
        &self,
        approval: Option<ApprovalState>,
    ) -> Result<Vec<BotRecord>, FleetError>;

    async fn update_bot_status(&self, id: &str, status: BotStatus) -> Result<(), FleetError>;

    async fn set_bot_identity(
        &self,
        id: &str,
        identity: Option<&str>,
    ) -> Result<(), FleetError>;

    async fn set_bot_approval(
        &self,
        id: &str,
        approval: ApprovalState,
        expires_at: Option<&str>,
    ) -> Result<(), FleetError>;

    async fn set_bot_features(&self, id: &str, features: &FeatureFlags)
    -> Result<(), FleetError>;

    /// Add to the usage counters.
    async fn bump_bot_counters(
        &self,
        id: &str,
        messages: i64,
        commands: i64,
    ) -> Result<(), FleetError>;

    /// Heartbeat touch of `last_seen_at`.
    async fn touch_bot_seen(&self, id: &str, at: &str) -> Result<(), FleetError>;

    async fn delete_bot(&self, id: &str) -> Result<(), FleetError>;

    // --- Credential blobs ---

    async fn load_credential(&self, bot_id: &str) -> Result<Option<Vec<u8>>, FleetError>;

    async fn save_credential(&self, bot_id: &str, blob: &[u8]) -> Result<(), FleetError>;

    async fn clear_credential(&self, bot_id: &str) -> Result<(), FleetError>;

    // --- Activity log (append-only) ---

    async fn append_activity(
        &self,
        bot_id: &str,
        kind: &str,
        detail: &str,
    ) -> Result<(), FleetError>;

    async fn recent_activity(
        &self,
        bot_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, FleetError>;

    // --- Cross-server identity registry ---

    /// Atomically claim an identity for `server_name`. Exactly one of any
    /// set of concurrent claims for the same identity succeeds; losers see
    /// [`ClaimOutcome::AlreadyOwned`] naming the winner.
    async fn try_claim_identity(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<ClaimOutcome, FleetError>;

    async fn get_registry_entry(
        &self,
        identity: &str,
    ) -> Result<Option<RegistryEntry>, FleetError>;

    async fn list_registry(&self) -> Result<Vec<RegistryEntry>, FleetError>;

    /// Manual reassignment. Changes future ownership lookups only; the bot
    /// record and credential are not migrated.
    async fn set_registry_owner(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<(), FleetError>;

    async fn delete_registry_entry(&self, identity: &str) -> Result<(), FleetError>;

    // --- Per-(bot, service) config documents ---

    /// Fetch a service's JSON config document for a bot.
    async fn get_service_config(
        &self,
        bot_id: &str,
        service: &str,
    ) -> Result<Option<String>, FleetError>;

    /// Upsert a service's JSON config document for a bot.
    async fn put_service_config(
        &self,
        bot_id: &str,
        service: &str,
        document: &str,
    ) -> Result<(), FleetError>;
}
