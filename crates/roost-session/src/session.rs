// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-bot session: connection lifecycle, reconnect backoff, heartbeat, and
//! inbound event routing.
//!
//! One session owns one transport connection. Its event pump processes the
//! bot's events sequentially; awaiting inside the pump never blocks other
//! bots because every session runs its own task. All background work (pump,
//! heartbeat, reconnect timer) hangs off a per-lifecycle
//! [`CancellationToken`], so `stop()` deterministically prevents any further
//! firing -- a stopped bot never spontaneously reconnects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use roost_commands::{CommandContext, CommandRegistry, DispatchOutcome, dispatch, parse_command};
use roost_core::FleetError;
use roost_core::traits::{FleetStore, Transport, TransportConnection};
use roost_core::types::{
    BotStatus, ConnectionState, DisconnectReason, MessageKey, MessagePayload, OutboundContent,
    RevocationNotice, StatusNotice, TransportEvent, TransportMessage,
};
use roost_features::{CaptureOutcome, FeatureSet};
use roost_isolation::IsolationLayer;

use crate::backoff::reconnect_delay;

/// Optional hook for generating AI replies to plain text. Response
/// generation itself lives outside this system.
#[async_trait]
pub trait AiReplyHook: Send + Sync {
    async fn reply(
        &self,
        bot_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Option<String>, FleetError>;
}

/// Collaborators injected into every session by the process root.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn FleetStore>,
    pub transport: Arc<dyn Transport>,
    pub commands: Arc<CommandRegistry>,
    pub isolation: IsolationLayer,
    pub features: Arc<FeatureSet>,
    pub ai_reply: Option<Arc<dyn AiReplyHook>>,
}

/// Lifecycle tuning, derived from `[session]` config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub command_prefix: String,
    pub reconnect_base: Duration,
    pub reconnect_cap: Duration,
    pub settle_delay: Duration,
    pub heartbeat_interval: Duration,
    pub send_timeout: Duration,
}

impl From<&roost_config::model::SessionConfig> for SessionSettings {
    fn from(config: &roost_config::model::SessionConfig) -> Self {
        Self {
            command_prefix: config.command_prefix.clone(),
            reconnect_base: Duration::from_secs(config.reconnect_base_secs),
            reconnect_cap: Duration::from_secs(config.reconnect_cap_secs),
            settle_delay: Duration::from_secs(config.settle_delay_secs),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }
}

struct SessionState {
    status: BotStatus,
    attempts: u32,
    token: CancellationToken,
    conn: Option<Arc<dyn TransportConnection>>,
    pump: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    heartbeat_token: Option<CancellationToken>,
    reconnect: Option<JoinHandle<()>>,
}

struct SessionInner {
    bot_id: String,
    deps: SessionDeps,
    settings: SessionSettings,
    state: Mutex<SessionState>,
}

/// Handle to one bot's session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BotSession {
    inner: Arc<SessionInner>,
}

impl BotSession {
    pub fn new(bot_id: &str, deps: SessionDeps, settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                bot_id: bot_id.to_string(),
                deps,
                settings,
                state: Mutex::new(SessionState {
                    status: BotStatus::Offline,
                    attempts: 0,
                    token: CancellationToken::new(),
                    conn: None,
                    pump: None,
                    heartbeat: None,
                    heartbeat_token: None,
                    reconnect: None,
                }),
            }),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.inner.bot_id
    }

    pub async fn status(&self) -> BotStatus {
        self.inner.state.lock().await.status
    }

    /// Reconnect attempts since the last successful online transition.
    pub async fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().await.attempts
    }

    /// Start the session. Idempotent: a session that is already connecting,
    /// waiting for pairing, or online is left untouched.
    pub async fn start(&self) -> Result<(), FleetError> {
        {
            let mut state = self.inner.state.lock().await;
            match state.status {
                BotStatus::Connecting | BotStatus::QrRequired | BotStatus::Online => {
                    debug!(bot_id = %self.inner.bot_id, status = %state.status, "start is a no-op");
                    return Ok(());
                }
                BotStatus::Offline | BotStatus::Error => {}
            }
            // A manual start supersedes any pending reconnect timer.
            if let Some(handle) = state.reconnect.take() {
                handle.abort();
            }
            if state.token.is_cancelled() {
                state.token = CancellationToken::new();
            }
        }
        self.begin_connect().await
    }

    /// Stop the session. Idempotent. Cancels the pump, heartbeat, and any
    /// pending reconnect, closes the transport handle, and marks offline.
    pub async fn stop(&self) -> Result<(), FleetError> {
        let conn = {
            let mut state = self.inner.state.lock().await;
            state.token.cancel();
            if let Some(token) = state.heartbeat_token.take() {
                token.cancel();
            }
            if let Some(handle) = state.reconnect.take() {
                handle.abort();
            }
            state.heartbeat = None;
            state.pump = None;
            state.conn.take()
        };
        if let Some(conn) = conn
            && let Err(e) = conn.close().await
        {
            warn!(bot_id = %self.inner.bot_id, error = %e, "transport close failed");
        }
        self.set_status(BotStatus::Offline).await?;
        info!(bot_id = %self.inner.bot_id, "session stopped");
        Ok(())
    }

    /// `stop()`, a settle delay, then `start()`.
    pub async fn restart(&self) -> Result<(), FleetError> {
        self.stop().await?;
        tokio::time::sleep(self.inner.settings.settle_delay).await;
        self.start().await
    }

    /// Send content on the live connection, bounded by the send timeout.
    /// A timeout surfaces as a typed failure; it is never retried here.
    pub async fn send(
        &self,
        chat_id: &str,
        content: OutboundContent,
    ) -> Result<MessageKey, FleetError> {
        let conn = self.current_conn().await?;
        self.send_on(&conn, chat_id, content).await
    }

    /// Invoke a command by name as if it arrived from `chat_id`, honoring
    /// the per-(bot, command) lock. Returns `None` when the invocation was
    /// dropped due to lock contention.
    pub async fn invoke_command(
        &self,
        name: &str,
        args: Vec<String>,
        sender_id: &str,
        chat_id: &str,
    ) -> Result<Option<DispatchOutcome>, FleetError> {
        let conn = self.current_conn().await?;
        let raw = format!("{}{name}", self.inner.settings.command_prefix);
        self.dispatch_on(&conn, name, args, sender_id, chat_id, &raw)
            .await
    }

    // --- connection lifecycle ---

    fn begin_connect(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), FleetError>> + Send + '_>>
    {
        Box::pin(async move {
        let bot_id = &self.inner.bot_id;
        self.set_status(BotStatus::Connecting).await?;

        let credential = self.inner.deps.store.load_credential(bot_id).await?;
        if let Some(blob) = &credential
            && blob.is_empty()
        {
            self.set_status(BotStatus::Error).await?;
            let err = FleetError::CredentialInvalid(format!(
                "credential blob for bot {bot_id} is empty"
            ));
            let _ = self
                .inner
                .deps
                .store
                .append_activity(bot_id, "credential", &err.to_string())
                .await;
            return Err(err);
        }

        match self.inner.deps.transport.connect(credential).await {
            Ok(conn) => {
                let token = {
                    let mut state = self.inner.state.lock().await;
                    if state.token.is_cancelled() {
                        // Stopped while connecting; drop the fresh handle.
                        let conn = Arc::clone(&conn);
                        tokio::spawn(async move {
                            let _ = conn.close().await;
                        });
                        return Ok(());
                    }
                    state.conn = Some(Arc::clone(&conn));
                    state.token.clone()
                };
                let pump = self.spawn_pump(Arc::clone(&conn), token);
                self.inner.state.lock().await.pump = Some(pump);
                Ok(())
            }
            // Credential and configuration failures need operator action;
            // retrying them would loop forever.
            Err(e) if e.is_fatal() || matches!(e, FleetError::Config(_)) => {
                self.set_status(BotStatus::Error).await?;
                let _ = self
                    .inner
                    .deps
                    .store
                    .append_activity(bot_id, "connect", &e.to_string())
                    .await;
                Err(e)
            }
            Err(e) => {
                warn!(bot_id = %bot_id, error = %e, "transport connect failed, will retry");
                self.schedule_reconnect().await;
                Ok(())
            }
        }
        })
    }

    fn spawn_pump(
        &self,
        conn: Arc<dyn TransportConnection>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = conn.next_event() => event,
                };
                let Some(event) = event else {
                    if !token.is_cancelled() {
                        session
                            .handle_close(DisconnectReason::ConnectionLost(
                                "event stream ended".to_string(),
                            ))
                            .await;
                    }
                    break;
                };
                match event {
                    TransportEvent::ConnectionStateChanged(cs) => {
                        let closed = session.handle_connection_state(cs, &conn).await;
                        if closed {
                            break;
                        }
                    }
                    TransportEvent::MessageReceived(msg) => {
                        session.route_message(&conn, msg).await;
                    }
                    TransportEvent::MessageRevoked(notice) => {
                        session.handle_revocation(&conn, notice).await;
                    }
                    TransportEvent::StatusUpdate(notice) => {
                        session.handle_status_update(&conn, notice).await;
                    }
                }
            }
            debug!(bot_id = %session.inner.bot_id, "event pump exited");
        })
    }

    /// Returns true when the connection closed and the pump should exit.
    async fn handle_connection_state(
        &self,
        cs: ConnectionState,
        conn: &Arc<dyn TransportConnection>,
    ) -> bool {
        let bot_id = &self.inner.bot_id;
        match cs {
            ConnectionState::Open => {
                if let Err(e) = self.set_status(BotStatus::Online).await {
                    warn!(bot_id = %bot_id, error = %e, "failed to persist online status");
                }
                // A successful online transition is the only thing that
                // resets the attempt counter.
                {
                    let mut state = self.inner.state.lock().await;
                    state.attempts = 0;
                }
                if let Some(blob) = conn.credential_snapshot().await
                    && let Err(e) = self.inner.deps.store.save_credential(bot_id, &blob).await
                {
                    warn!(bot_id = %bot_id, error = %e, "failed to persist credential");
                }
                self.start_heartbeat().await;
                info!(bot_id = %bot_id, "session online");
                false
            }
            ConnectionState::PairingRequired { code } => {
                if let Err(e) = self.set_status(BotStatus::QrRequired).await {
                    warn!(bot_id = %bot_id, error = %e, "failed to persist qr status");
                }
                let _ = self
                    .inner
                    .deps
                    .store
                    .append_activity(bot_id, "pairing", &format!("pairing code {code}"))
                    .await;
                false
            }
            ConnectionState::Closed { reason } => {
                self.handle_close(reason).await;
                true
            }
        }
    }

    async fn handle_close(&self, reason: DisconnectReason) {
        let bot_id = &self.inner.bot_id;
        {
            let mut state = self.inner.state.lock().await;
            if let Some(token) = state.heartbeat_token.take() {
                token.cancel();
            }
            state.heartbeat = None;
            state.conn = None;
        }

        match reason {
            DisconnectReason::LoggedOut => {
                info!(bot_id = %bot_id, "logged out; re-registration required");
                if let Err(e) = self.set_status(BotStatus::Offline).await {
                    warn!(bot_id = %bot_id, error = %e, "failed to persist offline status");
                }
                if let Err(e) = self.inner.deps.store.clear_credential(bot_id).await {
                    warn!(bot_id = %bot_id, error = %e, "failed to clear credential");
                }
                let _ = self
                    .inner
                    .deps
                    .store
                    .append_activity(bot_id, "logout", "logged out by transport")
                    .await;
            }
            DisconnectReason::ConnectionLost(detail) => {
                debug!(bot_id = %bot_id, detail = %detail, "connection lost");
                if let Err(e) = self.set_status(BotStatus::Offline).await {
                    warn!(bot_id = %bot_id, error = %e, "failed to persist offline status");
                }
                self.schedule_reconnect().await;
            }
        }
    }

    async fn schedule_reconnect(&self) {
        let bot_id = &self.inner.bot_id;
        let (token, delay, attempt) = {
            let mut state = self.inner.state.lock().await;
            if state.token.is_cancelled() {
                return;
            }
            state.attempts += 1;
            let delay = reconnect_delay(
                self.inner.settings.reconnect_base,
                self.inner.settings.reconnect_cap,
                state.attempts,
            );
            (state.token.clone(), delay, state.attempts)
        };

        info!(bot_id = %bot_id, attempt, delay_secs = delay.as_secs(), "reconnect scheduled");
        let _ = self
            .inner
            .deps
            .store
            .append_activity(
                bot_id,
                "reconnect",
                &format!("attempt {attempt} in {}s", delay.as_secs()),
            )
            .await;

        let session = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = session.begin_connect().await {
                        warn!(bot_id = %session.inner.bot_id, error = %e, "reconnect failed");
                    }
                }
            }
        });
        self.inner.state.lock().await.reconnect = Some(handle);
    }

    async fn start_heartbeat(&self) {
        let token = {
            let mut state = self.inner.state.lock().await;
            if state.heartbeat.is_some() {
                return;
            }
            let token = state.token.child_token();
            state.heartbeat_token = Some(token.clone());
            token
        };

        let session = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.inner.settings.heartbeat_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now().to_rfc3339();
                        if let Err(e) = session
                            .inner
                            .deps
                            .store
                            .touch_bot_seen(&session.inner.bot_id, &now)
                            .await
                        {
                            warn!(bot_id = %session.inner.bot_id, error = %e, "heartbeat touch failed");
                        }
                    }
                }
            }
        });
        self.inner.state.lock().await.heartbeat = Some(handle);
    }

    // --- inbound routing ---

    async fn route_message(&self, conn: &Arc<dyn TransportConnection>, msg: TransportMessage) {
        let bot_id = &self.inner.bot_id;
        let isolation = &self.inner.deps.isolation;

        if isolation.dedup.is_processed(bot_id, &msg.key) {
            debug!(bot_id = %bot_id, message_id = %msg.key.message_id, "duplicate event dropped");
            return;
        }
        isolation.dedup.mark_processed(bot_id, &msg.key);

        let bot = match self.inner.deps.store.get_bot(bot_id).await {
            Ok(Some(bot)) => bot,
            Ok(None) => {
                warn!(bot_id = %bot_id, "bot record missing, dropping message");
                return;
            }
            Err(e) => {
                warn!(bot_id = %bot_id, error = %e, "bot lookup failed, dropping message");
                return;
            }
        };
        let _ = self.inner.deps.store.bump_bot_counters(bot_id, 1, 0).await;

        // Command path.
        if let MessagePayload::Text { body } = &msg.payload
            && let Some((name, args)) = parse_command(body, &self.inner.settings.command_prefix)
        {
            let sender = msg
                .key
                .participant_id
                .clone()
                .unwrap_or_else(|| msg.key.chat_id.clone());
            if let Err(e) = self
                .dispatch_on(conn, &name, args, &sender, &msg.key.chat_id, body)
                .await
            {
                warn!(bot_id = %bot_id, command = %name, error = %e, "command reply failed");
            }
            return;
        }

        let owner_chat = bot
            .external_identity
            .clone()
            .unwrap_or_else(|| msg.key.chat_id.clone());

        if bot.features.view_once {
            match self
                .inner
                .deps
                .features
                .view_once
                .on_message(bot_id, &owner_chat, conn.as_ref(), &msg)
                .await
            {
                Ok(CaptureOutcome::Skipped) => {}
                Ok(_) => return,
                Err(e) => warn!(bot_id = %bot_id, error = %e, "view-once capture failed"),
            }
        }

        if bot.features.anti_delete
            && let Err(e) = self
                .inner
                .deps
                .features
                .anti_delete
                .on_message(bot_id, conn.as_ref(), &msg)
                .await
        {
            warn!(bot_id = %bot_id, error = %e, "deleted-message caching failed");
        }

        if bot.features.ai_reply
            && !msg.from_self
            && let Some(hook) = &self.inner.deps.ai_reply
            && let MessagePayload::Text { body } = &msg.payload
        {
            match hook.reply(bot_id, &msg.key.chat_id, body).await {
                Ok(Some(reply)) => {
                    if let Err(e) = self
                        .send_on(conn, &msg.key.chat_id, OutboundContent::Text(reply))
                        .await
                    {
                        warn!(bot_id = %bot_id, error = %e, "ai reply send failed");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(bot_id = %bot_id, error = %e, "ai reply hook failed"),
            }
        }
    }

    async fn dispatch_on(
        &self,
        conn: &Arc<dyn TransportConnection>,
        name: &str,
        args: Vec<String>,
        sender_id: &str,
        chat_id: &str,
        raw_text: &str,
    ) -> Result<Option<DispatchOutcome>, FleetError> {
        let bot_id = &self.inner.bot_id;
        let deps = &self.inner.deps;

        let Some(descriptor) = deps.commands.get(name) else {
            debug!(bot_id = %bot_id, name, "unknown command");
            return Ok(Some(DispatchOutcome::NotFound {
                name: name.to_string(),
            }));
        };

        // Lock on the canonical name so aliases contend with each other.
        let Some(_guard) = deps.isolation.locks.acquire(bot_id, &descriptor.name) else {
            debug!(
                bot_id = %bot_id,
                command = %descriptor.name,
                "lock contention, duplicate invocation dropped"
            );
            return Ok(None);
        };

        let ctx = CommandContext {
            bot_id: bot_id.clone(),
            sender_id: sender_id.to_string(),
            chat_id: chat_id.to_string(),
            args,
            raw_text: raw_text.to_string(),
        };
        let outcome = dispatch(&deps.commands, name, &ctx).await;
        let _ = deps.store.bump_bot_counters(bot_id, 0, 1).await;

        match &outcome {
            DispatchOutcome::Completed { command, reply } => {
                let _ = deps
                    .store
                    .append_activity(bot_id, "command", &format!("dispatched {command}"))
                    .await;
                if let Some(reply) = reply {
                    self.send_on(conn, chat_id, OutboundContent::Text(reply.clone()))
                        .await?;
                }
            }
            DispatchOutcome::Failed { command, message } => {
                let _ = deps
                    .store
                    .append_activity(
                        bot_id,
                        "command",
                        &format!("handler error in {command}: {message}"),
                    )
                    .await;
                // Report to chat; the session itself is unaffected.
                if let Err(e) = self
                    .send_on(
                        conn,
                        chat_id,
                        OutboundContent::Text(format!("Command {command} failed: {message}")),
                    )
                    .await
                {
                    warn!(bot_id = %bot_id, error = %e, "failure report send failed");
                }
            }
            DispatchOutcome::NotFound { .. } => {}
        }
        Ok(Some(outcome))
    }

    async fn handle_revocation(
        &self,
        conn: &Arc<dyn TransportConnection>,
        notice: RevocationNotice,
    ) {
        let bot_id = &self.inner.bot_id;
        let Ok(Some(bot)) = self.inner.deps.store.get_bot(bot_id).await else {
            return;
        };
        if !bot.features.anti_delete {
            return;
        }
        let owner_chat = bot
            .external_identity
            .clone()
            .unwrap_or_else(|| notice.key.chat_id.clone());
        match self
            .inner
            .deps
            .features
            .anti_delete
            .on_revoked(bot_id, &owner_chat, conn.as_ref(), &notice)
            .await
        {
            Ok(true) => debug!(bot_id = %bot_id, "deleted message forwarded"),
            Ok(false) => debug!(bot_id = %bot_id, "revocation for uncached message"),
            Err(e) => warn!(bot_id = %bot_id, error = %e, "deleted-message forward failed"),
        }
    }

    async fn handle_status_update(
        &self,
        conn: &Arc<dyn TransportConnection>,
        notice: StatusNotice,
    ) {
        let bot_id = &self.inner.bot_id;
        let Ok(Some(bot)) = self.inner.deps.store.get_bot(bot_id).await else {
            return;
        };
        if !bot.features.auto_status {
            return;
        }
        if let Err(e) = self
            .inner
            .deps
            .features
            .auto_status
            .on_status_update(bot_id, conn.as_ref(), &notice)
            .await
        {
            warn!(bot_id = %bot_id, error = %e, "status auto-view failed");
        }
    }

    // --- helpers ---

    async fn current_conn(&self) -> Result<Arc<dyn TransportConnection>, FleetError> {
        self.inner
            .state
            .lock()
            .await
            .conn
            .clone()
            .ok_or_else(|| FleetError::Transport {
                message: format!("bot {} is not connected", self.inner.bot_id),
                source: None,
            })
    }

    async fn send_on(
        &self,
        conn: &Arc<dyn TransportConnection>,
        chat_id: &str,
        content: OutboundContent,
    ) -> Result<MessageKey, FleetError> {
        let deadline = self.inner.settings.send_timeout;
        match tokio::time::timeout(deadline, conn.send(chat_id, content)).await {
            Ok(result) => result,
            Err(_) => Err(FleetError::Timeout { duration: deadline }),
        }
    }

    async fn set_status(&self, status: BotStatus) -> Result<(), FleetError> {
        {
            let mut state = self.inner.state.lock().await;
            debug!(
                bot_id = %self.inner.bot_id,
                from = %state.status,
                to = %status,
                "status transition"
            );
            state.status = status;
        }
        self.inner
            .deps
            .store
            .update_bot_status(&self.inner.bot_id, status)
            .await
    }
}
