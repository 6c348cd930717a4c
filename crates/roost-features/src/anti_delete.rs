// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deleted-message capture.
//!
//! While the bot's `anti_delete` flag is on, a bounded summary of every
//! inbound message is cached per message id: text is truncated, media is
//! downloaded into the scratch area. When a revocation event arrives for a
//! cached id, the content is forwarded to the owner with provenance and the
//! entry is evicted. Entries beyond the per-bot capacity evict oldest-first;
//! staged media additionally lives under the scratch area's aggregate size
//! sweep.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use roost_core::FleetError;
use roost_core::traits::{FleetStore, TransportConnection};
use roost_core::types::{
    MediaKind, MessageKey, MessagePayload, OutboundContent, RevocationNotice,
    TransportMessage,
};

use crate::scratch::ScratchArea;

/// Service name used as the config document key.
pub const ANTI_DELETE_SERVICE: &str = "anti_delete";

/// Persisted per-bot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiDeleteSettings {
    /// Forward recovered messages to this chat instead of the owner chat.
    pub forward_to: Option<String>,
}

/// Cached content, bounded: text truncated, media staged on disk.
#[derive(Debug, Clone)]
enum CachedContent {
    Text(String),
    Media {
        path: PathBuf,
        kind: MediaKind,
        caption: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct CachedMessage {
    key: MessageKey,
    sender_name: Option<String>,
    content: CachedContent,
}

#[derive(Default)]
struct BotCache {
    order: VecDeque<String>,
    by_id: HashMap<String, CachedMessage>,
}

/// Captures messages so deletions can be replayed to the owner.
pub struct DeletedMessageCapture {
    store: Arc<dyn FleetStore>,
    scratch: Arc<ScratchArea>,
    capacity: usize,
    summary_max_chars: usize,
    caches: Mutex<HashMap<String, BotCache>>,
}

impl DeletedMessageCapture {
    pub fn new(
        store: Arc<dyn FleetStore>,
        scratch: Arc<ScratchArea>,
        capacity: usize,
        summary_max_chars: usize,
    ) -> Self {
        Self {
            store,
            scratch,
            capacity,
            summary_max_chars,
            caches: Mutex::new(HashMap::new()),
        }
    }

    async fn load_settings(&self, bot_id: &str) -> AntiDeleteSettings {
        match self.store.get_service_config(bot_id, ANTI_DELETE_SERVICE).await {
            Ok(Some(doc)) => serde_json::from_str(&doc).unwrap_or_else(|e| {
                warn!(bot_id, error = %e, "corrupt anti_delete document, using defaults");
                AntiDeleteSettings::default()
            }),
            Ok(None) => AntiDeleteSettings::default(),
            Err(e) => {
                warn!(bot_id, error = %e, "failed to load anti_delete document");
                AntiDeleteSettings::default()
            }
        }
    }

    /// Number of cached entries for a bot.
    pub async fn cached_count(&self, bot_id: &str) -> usize {
        self.caches
            .lock()
            .await
            .get(bot_id)
            .map(|c| c.by_id.len())
            .unwrap_or(0)
    }

    /// Cache a bounded summary of an inbound message.
    ///
    /// Callers gate on the bot's `anti_delete` feature flag. Messages the
    /// bot itself sent are never cached.
    pub async fn on_message(
        &self,
        bot_id: &str,
        conn: &dyn TransportConnection,
        msg: &TransportMessage,
    ) -> Result<(), FleetError> {
        if msg.from_self {
            return Ok(());
        }

        let content = match &msg.payload {
            MessagePayload::Text { body } => {
                let summary: String = body.chars().take(self.summary_max_chars).collect();
                CachedContent::Text(summary)
            }
            MessagePayload::Media(media) if !media.view_once => {
                let bytes = match conn.download_media(&media.media_ref).await {
                    Ok(bytes) if !bytes.is_empty() => bytes,
                    Ok(_) => {
                        debug!(bot_id, message_id = %msg.key.message_id, "empty media, not cached");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(bot_id, error = %e, "media download failed, not cached");
                        return Ok(());
                    }
                };
                let path = self
                    .scratch
                    .stage(bot_id, &msg.key.message_id, &bytes)
                    .await?;
                CachedContent::Media {
                    path,
                    kind: media.kind,
                    caption: media.caption.clone(),
                }
            }
            // View-once and unknown payloads are not this service's job.
            _ => return Ok(()),
        };

        let mut caches = self.caches.lock().await;
        let cache = caches.entry(bot_id.to_string()).or_default();
        let message_id = msg.key.message_id.clone();

        if cache.by_id.insert(
            message_id.clone(),
            CachedMessage {
                key: msg.key.clone(),
                sender_name: msg.sender_name.clone(),
                content,
            },
        ).is_none()
        {
            cache.order.push_back(message_id);
        }

        // Evict oldest entries beyond capacity.
        while cache.order.len() > self.capacity {
            if let Some(oldest) = cache.order.pop_front()
                && let Some(evicted) = cache.by_id.remove(&oldest)
                && let CachedContent::Media { path, .. } = evicted.content
            {
                self.scratch.remove(&path).await;
            }
        }
        Ok(())
    }

    /// Forward the cached content for a revoked message, evicting the entry.
    ///
    /// Returns `true` when something was forwarded, `false` for uncached ids.
    pub async fn on_revoked(
        &self,
        bot_id: &str,
        owner_chat: &str,
        conn: &dyn TransportConnection,
        notice: &RevocationNotice,
    ) -> Result<bool, FleetError> {
        let cached = {
            let mut caches = self.caches.lock().await;
            let Some(cache) = caches.get_mut(bot_id) else {
                return Ok(false);
            };
            let Some(cached) = cache.by_id.remove(&notice.key.message_id) else {
                return Ok(false);
            };
            cache.order.retain(|id| id != &notice.key.message_id);
            cached
        };

        let settings = self.load_settings(bot_id).await;
        let target = settings.forward_to.as_deref().unwrap_or(owner_chat);

        let sender = cached.sender_name.as_deref().unwrap_or("unknown sender");
        let origin = cached
            .key
            .participant_id
            .as_deref()
            .unwrap_or(&cached.key.chat_id);
        let provenance = format!(
            "Deleted message recovered\nFrom: {sender} ({origin})\nChat: {}",
            cached.key.chat_id
        );

        match cached.content {
            CachedContent::Text(text) => {
                conn.send(
                    target,
                    OutboundContent::Text(format!("{provenance}\n\n{text}")),
                )
                .await?;
            }
            CachedContent::Media { path, kind, caption } => {
                match self.scratch.read(&path).await {
                    Ok(bytes) => {
                        let caption = match caption {
                            Some(caption) => format!("{provenance}\n\n{caption}"),
                            None => provenance,
                        };
                        conn.send(
                            target,
                            OutboundContent::Media {
                                kind,
                                bytes,
                                caption: Some(caption),
                            },
                        )
                        .await?;
                        self.scratch.remove(&path).await;
                    }
                    Err(_) => {
                        // Staged file lost to the aggregate sweep.
                        conn.send(
                            target,
                            OutboundContent::Text(format!(
                                "{provenance}\n\n(media no longer available)"
                            )),
                        )
                        .await?;
                    }
                }
            }
        }

        self.store
            .append_activity(
                bot_id,
                "anti_delete",
                &format!("forwarded deleted message {}", notice.key.message_id),
            )
            .await?;
        Ok(true)
    }
}
