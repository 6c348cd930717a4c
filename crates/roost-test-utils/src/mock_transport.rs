// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! [`MockTransport`] hands out [`MockConnection`]s with injectable inbound
//! events and captured outbound operations for assertion in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use roost_core::FleetError;
use roost_core::traits::{Transport, TransportConnection};
use roost_core::types::{MediaRef, MessageKey, OutboundContent, TransportEvent};

/// A mock transport factory.
///
/// Each `connect()` produces a fresh [`MockConnection`] and retains it for
/// inspection. Connect failures can be scripted to exercise retry paths.
pub struct MockTransport {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    credentials_seen: Mutex<Vec<Option<Vec<u8>>>>,
    fail_connects: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            credentials_seen: Mutex::new(Vec::new()),
            fail_connects: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` connect() calls fail with a transport error.
    pub fn fail_next_connects(&self, n: usize) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }

    /// All connections handed out so far, oldest first.
    pub async fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().await.clone()
    }

    /// The most recent connection, if any.
    pub async fn last_connection(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().await.last().cloned()
    }

    /// Number of connect() calls that produced a connection.
    pub async fn connect_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Credentials passed to each connect() call, in order.
    pub async fn credentials_seen(&self) -> Vec<Option<Vec<u8>>> {
        self.credentials_seen.lock().await.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(
        &self,
        credential: Option<Vec<u8>>,
    ) -> Result<Arc<dyn TransportConnection>, FleetError> {
        self.credentials_seen.lock().await.push(credential.clone());

        let remaining = self.fail_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(FleetError::Transport {
                message: "scripted connect failure".into(),
                source: None,
            });
        }

        let conn = Arc::new(MockConnection::new(credential));
        self.connections.lock().await.push(Arc::clone(&conn));
        Ok(conn)
    }
}

/// A mock transport connection.
///
/// Inbound events are injected via [`inject_event`](MockConnection::inject_event)
/// and drained by `next_event()`. Every outbound operation is captured.
pub struct MockConnection {
    events: Mutex<VecDeque<TransportEvent>>,
    notify: Notify,
    closed: AtomicBool,
    stall_sends: AtomicBool,
    sent: Mutex<Vec<(String, OutboundContent)>>,
    read_receipts: Mutex<Vec<Vec<MessageKey>>>,
    reactions: Mutex<Vec<(MessageKey, String)>>,
    media: Mutex<HashMap<String, Vec<u8>>>,
    credential: Mutex<Option<Vec<u8>>>,
}

impl MockConnection {
    pub fn new(credential: Option<Vec<u8>>) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            stall_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            read_receipts: Mutex::new(Vec::new()),
            reactions: Mutex::new(Vec::new()),
            media: Mutex::new(HashMap::new()),
            credential: Mutex::new(credential),
        }
    }

    /// Queue an inbound event for `next_event()`.
    pub async fn inject_event(&self, event: TransportEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Register downloadable bytes behind a media ref. Unregistered refs
    /// download as empty (the single-view-consumed case).
    pub async fn stage_media(&self, media_ref: &MediaRef, bytes: Vec<u8>) {
        self.media.lock().await.insert(media_ref.0.clone(), bytes);
    }

    /// Replace the credential snapshot the connection reports.
    pub async fn set_credential(&self, blob: Option<Vec<u8>>) {
        *self.credential.lock().await = blob;
    }

    /// Make send() hang forever, for timeout tests.
    pub fn stall_sends(&self) {
        self.stall_sends.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// All (chat id, content) pairs passed to send().
    pub async fn sent(&self) -> Vec<(String, OutboundContent)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// All read_messages() calls.
    pub async fn read_receipts(&self) -> Vec<Vec<MessageKey>> {
        self.read_receipts.lock().await.clone()
    }

    /// All react() calls.
    pub async fn reactions(&self) -> Vec<(MessageKey, String)> {
        self.reactions.lock().await.clone()
    }
}

#[async_trait]
impl TransportConnection for MockConnection {
    async fn next_event(&self) -> Option<TransportEvent> {
        loop {
            {
                let mut queue = self.events.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    async fn send(
        &self,
        chat_id: &str,
        content: OutboundContent,
    ) -> Result<MessageKey, FleetError> {
        if self.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(FleetError::Transport {
                message: "connection closed".into(),
                source: None,
            });
        }
        self.sent
            .lock()
            .await
            .push((chat_id.to_string(), content));
        Ok(MessageKey::new(
            &format!("mock-{}", uuid::Uuid::new_v4()),
            chat_id,
            None,
        ))
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), FleetError> {
        self.read_receipts.lock().await.push(keys.to_vec());
        Ok(())
    }

    async fn react(&self, key: &MessageKey, emoji: &str) -> Result<(), FleetError> {
        self.reactions
            .lock()
            .await
            .push((key.clone(), emoji.to_string()));
        Ok(())
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, FleetError> {
        Ok(self
            .media
            .lock()
            .await
            .get(&media.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn credential_snapshot(&self) -> Option<Vec<u8>> {
        self.credential.lock().await.clone()
    }

    async fn close(&self) -> Result<(), FleetError> {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_core::types::{ConnectionState, MessagePayload, TransportMessage};

    fn message_event(id: &str, body: &str) -> TransportEvent {
        TransportEvent::MessageReceived(TransportMessage {
            key: MessageKey::new(id, "chat-1", None),
            sender_name: Some("tester".into()),
            from_self: false,
            payload: MessagePayload::text(body),
            timestamp: "2026-01-01T00:00:00Z".into(),
        })
    }

    #[tokio::test]
    async fn events_drain_in_order() {
        let conn = MockConnection::new(None);
        conn.inject_event(message_event("m1", "first")).await;
        conn.inject_event(message_event("m2", "second")).await;

        let TransportEvent::MessageReceived(first) = conn.next_event().await.unwrap() else {
            panic!("expected message");
        };
        assert_eq!(first.key.message_id, "m1");
        let TransportEvent::MessageReceived(second) = conn.next_event().await.unwrap() else {
            panic!("expected message");
        };
        assert_eq!(second.key.message_id, "m2");
    }

    #[tokio::test]
    async fn next_event_returns_none_after_close() {
        let conn = Arc::new(MockConnection::new(None));
        let waiter = Arc::clone(&conn);
        let handle = tokio::spawn(async move { waiter.next_event().await });

        tokio::task::yield_now().await;
        conn.close().await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("close should wake the waiter")
            .unwrap();
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn scripted_connect_failures_then_success() {
        let transport = MockTransport::new();
        transport.fail_next_connects(2);

        assert!(transport.connect(None).await.is_err());
        assert!(transport.connect(None).await.is_err());
        assert!(transport.connect(None).await.is_ok());
        assert_eq!(transport.connect_count().await, 1);
        assert_eq!(transport.credentials_seen().await.len(), 3);
    }

    #[tokio::test]
    async fn send_and_download_are_captured() {
        let conn = MockConnection::new(None);
        conn.send("chat-1", OutboundContent::Text("hello".into()))
            .await
            .unwrap();
        assert_eq!(conn.sent_count().await, 1);

        let media_ref = MediaRef("media-1".into());
        conn.stage_media(&media_ref, vec![1, 2, 3]).await;
        assert_eq!(conn.download_media(&media_ref).await.unwrap(), vec![1, 2, 3]);
        assert!(
            conn.download_media(&MediaRef("gone".into()))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn connection_state_events_pass_through() {
        let conn = MockConnection::new(None);
        conn.inject_event(TransportEvent::ConnectionStateChanged(ConnectionState::Open))
            .await;
        assert_eq!(
            conn.next_event().await.unwrap(),
            TransportEvent::ConnectionStateChanged(ConnectionState::Open)
        );
    }
}
