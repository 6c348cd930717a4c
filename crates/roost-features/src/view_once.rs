// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hidden-once media capture.
//!
//! The transport wraps single-view media in one of a few payload shapes:
//! flagged directly on the media, inside a `ViewOnce` wrapper, or inside a
//! doubly-nested wrapper. Extraction walks those known variants of the
//! decoded tagged union in order and downloads the first candidate that
//! yields non-empty bytes. Empty bytes mean the transport already consumed
//! the single view: an expected outcome reported to the owner, not a bug.
//! Exactly one notification (success or failure) is sent per message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use roost_core::FleetError;
use roost_core::traits::{FleetStore, TransportConnection};
use roost_core::types::{
    MediaMessage, MessagePayload, OutboundContent, TransportMessage,
};

use crate::scratch::ScratchArea;

/// Service name used as the config document key.
pub const VIEW_ONCE_SERVICE: &str = "view_once";

/// Persisted per-bot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOnceSettings {
    /// Forward captured media to this chat instead of the owner chat.
    pub forward_to: Option<String>,
}

/// What a capture attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The payload carried no single-view media.
    Skipped,
    /// Media recovered, persisted, and forwarded.
    Captured,
    /// Detected but the transport had already consumed it. Expected.
    Unrecoverable,
    /// A transport error prevented the capture attempt.
    Failed,
}

/// Candidate media references, in strategy order: direct flagged media,
/// single wrapper, double wrapper.
fn extraction_candidates(payload: &MessagePayload) -> Vec<&MediaMessage> {
    match payload {
        MessagePayload::Media(media) if media.view_once => vec![media],
        MessagePayload::ViewOnce { inner } => match inner.as_ref() {
            MessagePayload::Media(media) => vec![media],
            MessagePayload::ViewOnce { inner } => match inner.as_ref() {
                MessagePayload::Media(media) => vec![media],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Captures single-view media before the transport discards it.
pub struct ViewOnceCapture {
    store: Arc<dyn FleetStore>,
    scratch: Arc<ScratchArea>,
}

impl ViewOnceCapture {
    pub fn new(store: Arc<dyn FleetStore>, scratch: Arc<ScratchArea>) -> Self {
        Self { store, scratch }
    }

    async fn load_settings(&self, bot_id: &str) -> ViewOnceSettings {
        match self.store.get_service_config(bot_id, VIEW_ONCE_SERVICE).await {
            Ok(Some(doc)) => serde_json::from_str(&doc).unwrap_or_else(|e| {
                warn!(bot_id, error = %e, "corrupt view_once document, using defaults");
                ViewOnceSettings::default()
            }),
            Ok(None) => ViewOnceSettings::default(),
            Err(e) => {
                warn!(bot_id, error = %e, "failed to load view_once document");
                ViewOnceSettings::default()
            }
        }
    }

    /// Attempt to capture single-view media from one inbound message.
    ///
    /// Callers gate on the bot's `view_once` feature flag.
    pub async fn on_message(
        &self,
        bot_id: &str,
        owner_chat: &str,
        conn: &dyn TransportConnection,
        msg: &TransportMessage,
    ) -> Result<CaptureOutcome, FleetError> {
        let candidates = extraction_candidates(&msg.payload);
        if candidates.is_empty() {
            return Ok(CaptureOutcome::Skipped);
        }

        let settings = self.load_settings(bot_id).await;
        let target = settings.forward_to.as_deref().unwrap_or(owner_chat);
        let sender = msg.sender_name.as_deref().unwrap_or("unknown sender");
        let message_id = &msg.key.message_id;

        let mut transport_failure: Option<FleetError> = None;
        for media in &candidates {
            let bytes = match conn.download_media(&media.media_ref).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(bot_id, message_id, error = %e, "view-once download errored");
                    transport_failure = Some(e);
                    continue;
                }
            };
            if bytes.is_empty() {
                continue;
            }

            // Recovered: persist, then forward with provenance.
            self.scratch.stage(bot_id, message_id, &bytes).await?;
            let caption = format!(
                "View-once media captured\nFrom: {sender}\nChat: {}",
                msg.key.chat_id
            );
            conn.send(
                target,
                OutboundContent::Media {
                    kind: media.kind,
                    bytes,
                    caption: Some(caption),
                },
            )
            .await?;
            self.store
                .append_activity(
                    bot_id,
                    "view_once",
                    &format!("captured view-once media {message_id}"),
                )
                .await?;
            return Ok(CaptureOutcome::Captured);
        }

        // Nothing recovered. Best-effort notification, distinguishing the
        // expected consumed case from a transport error.
        let (outcome, note) = match transport_failure {
            None => {
                let err = FleetError::MediaUnrecoverable {
                    message_id: message_id.clone(),
                };
                self.store
                    .append_activity(bot_id, "view_once", &err.to_string())
                    .await?;
                (
                    CaptureOutcome::Unrecoverable,
                    format!(
                        "View-once media from {sender} detected but not recoverable \
                         (already consumed)"
                    ),
                )
            }
            Some(e) => {
                self.store
                    .append_activity(
                        bot_id,
                        "view_once",
                        &format!("capture error for {message_id}: {e}"),
                    )
                    .await?;
                (
                    CaptureOutcome::Failed,
                    format!("View-once media from {sender} could not be captured: {e}"),
                )
            }
        };

        if let Err(e) = conn.send(target, OutboundContent::Text(note)).await {
            warn!(bot_id, message_id, error = %e, "view-once notification failed");
        }
        Ok(outcome)
    }
}
