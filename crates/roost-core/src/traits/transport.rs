// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait seam for the external messaging protocol client.
//!
//! Roost never implements the messaging protocol itself; it drives a
//! protocol client supplied behind these traits. One [`Transport`] serves
//! the whole process; each `connect` yields an independent connection for
//! one bot.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FleetError;
use crate::types::{MediaRef, MessageKey, OutboundContent, TransportEvent};

/// Factory for per-bot transport connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Protocol name, used in logs and activity records.
    fn name(&self) -> &str;

    /// Open a connection, resuming from a persisted credential blob when one
    /// is given. A `None` credential starts a fresh pairing flow.
    async fn connect(
        &self,
        credential: Option<Vec<u8>>,
    ) -> Result<Arc<dyn TransportConnection>, FleetError>;
}

/// One live connection for one bot.
///
/// Events are consumed by exactly one pump task; the send/read/react/download
/// operations may be called from anywhere while the connection is open.
#[async_trait]
pub trait TransportConnection: Send + Sync + 'static {
    /// Next inbound event. Returns `None` once the connection is torn down
    /// and no further events will arrive.
    async fn next_event(&self) -> Option<TransportEvent>;

    /// Send content to a chat. Returns the key of the sent message.
    async fn send(
        &self,
        chat_id: &str,
        content: OutboundContent,
    ) -> Result<MessageKey, FleetError>;

    /// Mark messages as read (also used for status view receipts).
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), FleetError>;

    /// React to a message with an emoji.
    async fn react(&self, key: &MessageKey, emoji: &str) -> Result<(), FleetError>;

    /// Download the raw bytes behind a media reference.
    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, FleetError>;

    /// Current credential blob for persistence, if the transport has
    /// materialized one (e.g. after a successful pairing).
    async fn credential_snapshot(&self) -> Option<Vec<u8>>;

    /// Close the connection. Idempotent.
    async fn close(&self) -> Result<(), FleetError>;
}
