// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status auto-view/react service.
//!
//! On a status-update event the service marks the status viewed and
//! optionally reacts. Viewing and reacting are throttled independently via
//! last-action timestamps persisted in the bot's `auto_status` config
//! document, so throttles survive restarts. A throttle hit is a silent skip.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use roost_core::FleetError;
use roost_core::traits::{FleetStore, TransportConnection};
use roost_core::types::StatusNotice;

/// Service name used as the config document key.
pub const AUTO_STATUS_SERVICE: &str = "auto_status";

/// Persisted per-bot settings and throttle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStatusSettings {
    /// Also react to statuses after viewing them.
    pub react_enabled: bool,
    pub react_emoji: String,
    pub view_throttle_secs: u64,
    pub react_throttle_secs: u64,
    /// RFC 3339 timestamp of the last view receipt.
    pub last_view_at: Option<String>,
    /// RFC 3339 timestamp of the last reaction.
    pub last_react_at: Option<String>,
}

impl Default for AutoStatusSettings {
    fn default() -> Self {
        Self {
            react_enabled: false,
            react_emoji: "💚".to_string(),
            view_throttle_secs: 3,
            react_throttle_secs: 3,
            last_view_at: None,
            last_react_at: None,
        }
    }
}

/// True when `last` is within `throttle_secs` of `now`.
fn throttled(
    last: &Option<String>,
    throttle_secs: u64,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    let Some(last) = last else {
        return false;
    };
    match chrono::DateTime::parse_from_rfc3339(last) {
        Ok(last) => {
            let elapsed = now.signed_duration_since(last.with_timezone(&chrono::Utc));
            elapsed < chrono::TimeDelta::seconds(throttle_secs as i64)
        }
        // An unparseable timestamp never throttles.
        Err(_) => false,
    }
}

/// Auto-views (and optionally reacts to) contact status updates.
///
/// Callers gate on the bot's `auto_status` feature flag; this service only
/// applies the per-bot settings document and its throttles.
pub struct StatusAutoViewer {
    store: Arc<dyn FleetStore>,
}

impl StatusAutoViewer {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    async fn load_settings(&self, bot_id: &str) -> AutoStatusSettings {
        match self.store.get_service_config(bot_id, AUTO_STATUS_SERVICE).await {
            Ok(Some(doc)) => serde_json::from_str(&doc).unwrap_or_else(|e| {
                warn!(bot_id, error = %e, "corrupt auto_status document, using defaults");
                AutoStatusSettings::default()
            }),
            Ok(None) => AutoStatusSettings::default(),
            Err(e) => {
                warn!(bot_id, error = %e, "failed to load auto_status document");
                AutoStatusSettings::default()
            }
        }
    }

    async fn save_settings(
        &self,
        bot_id: &str,
        settings: &AutoStatusSettings,
    ) -> Result<(), FleetError> {
        let doc = serde_json::to_string(settings).map_err(|e| FleetError::Internal(
            format!("auto_status settings serialization: {e}"),
        ))?;
        self.store
            .put_service_config(bot_id, AUTO_STATUS_SERVICE, &doc)
            .await
    }

    /// Handle one status-update event.
    pub async fn on_status_update(
        &self,
        bot_id: &str,
        conn: &dyn TransportConnection,
        notice: &StatusNotice,
    ) -> Result<(), FleetError> {
        let mut settings = self.load_settings(bot_id).await;
        let now = chrono::Utc::now();
        let mut changed = false;

        if throttled(&settings.last_view_at, settings.view_throttle_secs, now) {
            debug!(bot_id, poster = %notice.poster_id, "status view throttled");
        } else {
            conn.read_messages(std::slice::from_ref(&notice.key)).await?;
            settings.last_view_at = Some(now.to_rfc3339());
            changed = true;
            debug!(bot_id, poster = %notice.poster_id, "status viewed");
        }

        if settings.react_enabled {
            if throttled(&settings.last_react_at, settings.react_throttle_secs, now) {
                debug!(bot_id, poster = %notice.poster_id, "status reaction throttled");
            } else {
                conn.react(&notice.key, &settings.react_emoji).await?;
                settings.last_react_at = Some(now.to_rfc3339());
                changed = true;
            }
        }

        if changed {
            self.save_settings(bot_id, &settings).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_core::types::MessageKey;
    use roost_test_utils::{MemoryStore, MockConnection};

    fn notice(id: &str) -> StatusNotice {
        StatusNotice {
            key: MessageKey::new(id, "status@broadcast", Some("poster-1")),
            poster_id: "poster-1".to_string(),
        }
    }

    async fn seed(store: &MemoryStore, bot_id: &str, settings: &AutoStatusSettings) {
        store
            .put_service_config(
                bot_id,
                AUTO_STATUS_SERVICE,
                &serde_json::to_string(settings).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn views_and_persists_timestamp() {
        let store = Arc::new(MemoryStore::new("S1"));
        let viewer = StatusAutoViewer::new(store.clone());
        let conn = MockConnection::new(None);

        viewer.on_status_update("b1", &conn, &notice("s1")).await.unwrap();

        let receipts = conn.read_receipts().await;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0][0].message_id, "s1");

        let doc = store
            .get_service_config("b1", AUTO_STATUS_SERVICE)
            .await
            .unwrap()
            .expect("settings persisted");
        let saved: AutoStatusSettings = serde_json::from_str(&doc).unwrap();
        assert!(saved.last_view_at.is_some());
        // Reactions are off by default.
        assert!(conn.reactions().await.is_empty());
    }

    #[tokio::test]
    async fn view_within_throttle_is_a_silent_skip() {
        let store = Arc::new(MemoryStore::new("S1"));
        let settings = AutoStatusSettings {
            last_view_at: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        seed(&store, "b1", &settings).await;

        let viewer = StatusAutoViewer::new(store.clone());
        let conn = MockConnection::new(None);
        viewer.on_status_update("b1", &conn, &notice("s1")).await.unwrap();

        assert!(conn.read_receipts().await.is_empty(), "throttled view must skip");
    }

    #[tokio::test]
    async fn view_proceeds_once_throttle_has_lapsed() {
        let store = Arc::new(MemoryStore::new("S1"));
        let past = (chrono::Utc::now() - chrono::TimeDelta::seconds(10)).to_rfc3339();
        let settings = AutoStatusSettings {
            last_view_at: Some(past),
            ..Default::default()
        };
        seed(&store, "b1", &settings).await;

        let viewer = StatusAutoViewer::new(store.clone());
        let conn = MockConnection::new(None);
        viewer.on_status_update("b1", &conn, &notice("s1")).await.unwrap();
        assert_eq!(conn.read_receipts().await.len(), 1);
    }

    #[tokio::test]
    async fn view_and_react_throttles_are_independent() {
        let store = Arc::new(MemoryStore::new("S1"));
        // View recently done, reaction long ago: only the reaction fires.
        let settings = AutoStatusSettings {
            react_enabled: true,
            last_view_at: Some(chrono::Utc::now().to_rfc3339()),
            last_react_at: Some(
                (chrono::Utc::now() - chrono::TimeDelta::seconds(60)).to_rfc3339(),
            ),
            ..Default::default()
        };
        seed(&store, "b1", &settings).await;

        let viewer = StatusAutoViewer::new(store.clone());
        let conn = MockConnection::new(None);
        viewer.on_status_update("b1", &conn, &notice("s1")).await.unwrap();

        assert!(conn.read_receipts().await.is_empty());
        let reactions = conn.reactions().await;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].1, "💚");
    }

    #[tokio::test]
    async fn corrupt_document_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::new("S1"));
        store
            .put_service_config("b1", AUTO_STATUS_SERVICE, "not json")
            .await
            .unwrap();

        let viewer = StatusAutoViewer::new(store.clone());
        let conn = MockConnection::new(None);
        viewer.on_status_update("b1", &conn, &notice("s1")).await.unwrap();
        assert_eq!(conn.read_receipts().await.len(), 1);
    }
}
