// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across trait seams and the Roost workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a bot connection.
///
/// Stored as text in the `bots` table; `Display`/`FromStr` round-trip
/// through the same snake_case strings as the serde representation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Offline,
    Connecting,
    QrRequired,
    Online,
    Error,
}

/// Operator approval state of a bot record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

/// Per-bot feature toggles, stored as a JSON document on the bot row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// Auto-view (and optionally react to) contact status updates.
    pub auto_status: bool,
    /// Capture and re-forward deleted messages.
    pub anti_delete: bool,
    /// Capture single-view media before the transport discards it.
    pub view_once: bool,
    /// Route plain text through the AI-reply hook.
    pub ai_reply: bool,
}

impl FeatureFlags {
    /// Toggle a flag by its wire name. Returns `false` for unknown names.
    pub fn toggle(&mut self, name: &str) -> bool {
        match name {
            "auto_status" => self.auto_status = !self.auto_status,
            "anti_delete" => self.anti_delete = !self.anti_delete,
            "view_once" => self.view_once = !self.view_once,
            "ai_reply" => self.ai_reply = !self.ai_reply,
            _ => return false,
        }
        true
    }
}

/// Persisted state for one tenant-owned bot connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecord {
    /// Unique bot identifier.
    pub id: String,
    /// Name of the server process that owns this record.
    pub server_name: String,
    /// Network-level identity (phone number) once linked, else `None`.
    pub external_identity: Option<String>,
    /// Current lifecycle status.
    pub status: BotStatus,
    /// Feature toggles.
    pub features: FeatureFlags,
    /// Count of inbound messages routed for this bot.
    pub messages_handled: i64,
    /// Count of commands dispatched for this bot.
    pub commands_handled: i64,
    /// Operator approval state.
    pub approval: ApprovalState,
    /// RFC 3339 approval expiry, if the approval is time-limited.
    pub approval_expires_at: Option<String>,
    /// RFC 3339 timestamp of the last heartbeat touch. Observational only.
    pub last_seen_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Identifies a single message on the transport.
///
/// The triple (message id, chat id, participant id) is the deduplication key:
/// the same message id can legitimately appear in different chats, and in
/// group chats the participant disambiguates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub message_id: String,
    pub chat_id: String,
    pub participant_id: Option<String>,
}

impl MessageKey {
    pub fn new(message_id: &str, chat_id: &str, participant_id: Option<&str>) -> Self {
        Self {
            message_id: message_id.to_string(),
            chat_id: chat_id.to_string(),
            participant_id: participant_id.map(str::to_string),
        }
    }
}

/// Opaque transport handle for downloadable media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef(pub String);

/// Kind of a media payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

/// A media message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMessage {
    pub kind: MediaKind,
    pub media_ref: MediaRef,
    pub caption: Option<String>,
    /// Set when the transport marked this media viewable only once.
    pub view_once: bool,
}

/// Decoded message body.
///
/// A closed tagged union over the transport variants Roost understands.
/// Anything the decoder does not recognize lands in `Unknown` instead of
/// being probed field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { body: String },
    Media(MediaMessage),
    /// A wrapper the transport nests single-view content inside. Wrappers
    /// can themselves be nested one level deep in the wild.
    ViewOnce { inner: Box<MessagePayload> },
    Unknown,
}

impl MessagePayload {
    pub fn text(body: &str) -> Self {
        MessagePayload::Text {
            body: body.to_string(),
        }
    }
}

/// An inbound message event from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    pub key: MessageKey,
    /// Display name of the sender, when the transport provides one.
    pub sender_name: Option<String>,
    /// True when the connected account itself sent the message.
    pub from_self: bool,
    pub payload: MessagePayload,
    pub timestamp: String,
}

/// A message-revocation (delete-for-everyone) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationNotice {
    pub key: MessageKey,
}

/// A contact status update event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    /// Key of the status message (used for view receipts and reactions).
    pub key: MessageKey,
    /// Identity of the contact who posted the status.
    pub poster_id: String,
}

/// Reason a transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The account was logged out remotely. Reconnecting is pointless;
    /// the bot must be re-registered.
    LoggedOut,
    /// Any other close; the session retries with backoff.
    ConnectionLost(String),
}

/// Connection state reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Open,
    /// The transport needs the operator to scan a pairing code.
    PairingRequired { code: String },
    Closed { reason: DisconnectReason },
}

/// Events emitted by a live transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    ConnectionStateChanged(ConnectionState),
    MessageReceived(TransportMessage),
    MessageRevoked(RevocationNotice),
    StatusUpdate(StatusNotice),
}

/// Content for an outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    Media {
        kind: MediaKind,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
}

/// Cross-process registry row: external identity -> owning server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub identity: String,
    pub server_name: String,
    pub claimed_at: String,
}

/// Outcome of an atomic identity claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This server now owns the identity.
    Claimed,
    /// Another server already owns it.
    AlreadyOwned { owner: String },
}

/// One row of the append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub bot_id: String,
    pub kind: String,
    pub detail: String,
    pub created_at: String,
}

/// A management action to run against a bot, possibly on another server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BotAction {
    Start,
    Stop,
    Restart,
}

/// An ephemeral cross-tenancy action envelope. Routed request/response,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossTenancyAction {
    pub bot_id: String,
    pub action: BotAction,
    pub owning_server: String,
}
