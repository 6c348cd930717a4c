// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`FleetStore`] for unit tests.
//!
//! Mirrors the SQLite adapter's observable behavior, including the
//! insert-if-absent claim semantics, without touching disk. Production code
//! must use the SQLite store; only its uniqueness constraint is safe across
//! processes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use tokio::sync::Mutex;

use roost_core::FleetError;
use roost_core::traits::FleetStore;
use roost_core::types::{
    ActivityRecord, ApprovalState, BotRecord, BotStatus, ClaimOutcome, FeatureFlags,
    RegistryEntry,
};

#[derive(Default)]
struct Inner {
    bots: HashMap<String, BotRecord>,
    credentials: HashMap<String, Vec<u8>>,
    activity: Vec<ActivityRecord>,
    registry: HashMap<String, RegistryEntry>,
    service_configs: HashMap<(String, String), String>,
}

/// Shared-state in-memory store.
pub struct MemoryStore {
    server_name: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Activity rows recorded for a bot, oldest first.
    pub async fn activity_for(&self, bot_id: &str) -> Vec<ActivityRecord> {
        self.inner
            .lock()
            .await
            .activity
            .iter()
            .filter(|r| r.bot_id == bot_id)
            .cloned()
            .collect()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn initialize(&self) -> Result<(), FleetError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), FleetError> {
        Ok(())
    }

    async fn create_bot(&self, bot: &BotRecord) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if inner.bots.contains_key(&bot.id) {
            return Err(FleetError::Storage {
                source: format!("bot {} already exists", bot.id).into(),
            });
        }
        inner.bots.insert(bot.id.clone(), bot.clone());
        Ok(())
    }

    async fn get_bot(&self, id: &str) -> Result<Option<BotRecord>, FleetError> {
        Ok(self.inner.lock().await.bots.get(id).cloned())
    }

    async fn list_bots(
        &self,
        approval: Option<ApprovalState>,
    ) -> Result<Vec<BotRecord>, FleetError> {
        let inner = self.inner.lock().await;
        let mut bots: Vec<BotRecord> = inner
            .bots
            .values()
            .filter(|b| b.server_name == self.server_name)
            .filter(|b| approval.is_none_or(|a| b.approval == a))
            .cloned()
            .collect();
        bots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bots)
    }

    async fn update_bot_status(&self, id: &str, status: BotStatus) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.status = status;
            bot.updated_at = now();
        }
        Ok(())
    }

    async fn set_bot_identity(
        &self,
        id: &str,
        identity: Option<&str>,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.external_identity = identity.map(str::to_string);
            bot.updated_at = now();
        }
        Ok(())
    }

    async fn set_bot_approval(
        &self,
        id: &str,
        approval: ApprovalState,
        expires_at: Option<&str>,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.approval = approval;
            bot.approval_expires_at = expires_at.map(str::to_string);
            bot.updated_at = now();
        }
        Ok(())
    }

    async fn set_bot_features(
        &self,
        id: &str,
        features: &FeatureFlags,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.features = *features;
            bot.updated_at = now();
        }
        Ok(())
    }

    async fn bump_bot_counters(
        &self,
        id: &str,
        messages: i64,
        commands: i64,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.messages_handled += messages;
            bot.commands_handled += commands;
        }
        Ok(())
    }

    async fn touch_bot_seen(&self, id: &str, at: &str) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(bot) = inner.bots.get_mut(id) {
            bot.last_seen_at = Some(at.to_string());
        }
        Ok(())
    }

    async fn delete_bot(&self, id: &str) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        inner.bots.remove(id);
        inner.credentials.remove(id);
        Ok(())
    }

    async fn load_credential(&self, bot_id: &str) -> Result<Option<Vec<u8>>, FleetError> {
        Ok(self.inner.lock().await.credentials.get(bot_id).cloned())
    }

    async fn save_credential(&self, bot_id: &str, blob: &[u8]) -> Result<(), FleetError> {
        self.inner
            .lock()
            .await
            .credentials
            .insert(bot_id.to_string(), blob.to_vec());
        Ok(())
    }

    async fn clear_credential(&self, bot_id: &str) -> Result<(), FleetError> {
        self.inner.lock().await.credentials.remove(bot_id);
        Ok(())
    }

    async fn append_activity(
        &self,
        bot_id: &str,
        kind: &str,
        detail: &str,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        let id = inner.activity.len() as i64 + 1;
        inner.activity.push(ActivityRecord {
            id,
            bot_id: bot_id.to_string(),
            kind: kind.to_string(),
            detail: detail.to_string(),
            created_at: now(),
        });
        Ok(())
    }

    async fn recent_activity(
        &self,
        bot_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, FleetError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .activity
            .iter()
            .rev()
            .filter(|r| r.bot_id == bot_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn try_claim_identity(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<ClaimOutcome, FleetError> {
        let mut inner = self.inner.lock().await;
        match inner.registry.entry(identity.to_string()) {
            Entry::Occupied(existing) => Ok(ClaimOutcome::AlreadyOwned {
                owner: existing.get().server_name.clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(RegistryEntry {
                    identity: identity.to_string(),
                    server_name: server_name.to_string(),
                    claimed_at: now(),
                });
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn get_registry_entry(
        &self,
        identity: &str,
    ) -> Result<Option<RegistryEntry>, FleetError> {
        Ok(self.inner.lock().await.registry.get(identity).cloned())
    }

    async fn list_registry(&self) -> Result<Vec<RegistryEntry>, FleetError> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<RegistryEntry> = inner.registry.values().cloned().collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(entries)
    }

    async fn set_registry_owner(
        &self,
        identity: &str,
        server_name: &str,
    ) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        match inner.registry.get_mut(identity) {
            Some(entry) => {
                entry.server_name = server_name.to_string();
                Ok(())
            }
            None => Err(FleetError::not_found("registry entry", identity)),
        }
    }

    async fn delete_registry_entry(&self, identity: &str) -> Result<(), FleetError> {
        self.inner.lock().await.registry.remove(identity);
        Ok(())
    }

    async fn get_service_config(
        &self,
        bot_id: &str,
        service: &str,
    ) -> Result<Option<String>, FleetError> {
        Ok(self
            .inner
            .lock()
            .await
            .service_configs
            .get(&(bot_id.to_string(), service.to_string()))
            .cloned())
    }

    async fn put_service_config(
        &self,
        bot_id: &str,
        service: &str,
        document: &str,
    ) -> Result<(), FleetError> {
        self.inner
            .lock()
            .await
            .service_configs
            .insert((bot_id.to_string(), service.to_string()), document.to_string());
        Ok(())
    }
}
