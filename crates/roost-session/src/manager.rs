// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fleet manager: one session per bot record, approval gating, and
//! process-wide lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use roost_core::FleetError;
use roost_core::types::{ApprovalState, BotAction, BotRecord, BotStatus};

use crate::session::{BotSession, SessionDeps, SessionSettings};

/// Owns every bot session in this process.
///
/// The manager is the admin plane's entry point: it gates lifecycle actions
/// on the bot's approval state and lazily constructs sessions from the
/// injected dependencies.
pub struct FleetManager {
    deps: SessionDeps,
    settings: SessionSettings,
    sessions: DashMap<String, BotSession>,
}

impl FleetManager {
    pub fn new(deps: SessionDeps, settings: SessionSettings) -> Self {
        Self {
            deps,
            settings,
            sessions: DashMap::new(),
        }
    }

    /// The session for a bot, if one has been constructed.
    pub fn session(&self, bot_id: &str) -> Option<BotSession> {
        self.sessions.get(bot_id).map(|s| s.clone())
    }

    /// Number of sessions currently online.
    pub async fn online_count(&self) -> usize {
        // Snapshot first; awaiting while holding DashMap shard guards could
        // block writers.
        let sessions: Vec<BotSession> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        let mut online = 0;
        for session in sessions {
            if session.status().await == BotStatus::Online {
                online += 1;
            }
        }
        online
    }

    async fn require_bot(&self, bot_id: &str) -> Result<BotRecord, FleetError> {
        self.deps
            .store
            .get_bot(bot_id)
            .await?
            .ok_or_else(|| FleetError::not_found("bot", bot_id))
    }

    /// Reject lifecycle actions for unapproved or expired bots.
    fn check_approval(bot: &BotRecord) -> Result<(), FleetError> {
        match bot.approval {
            ApprovalState::Approved => {}
            ApprovalState::Pending => {
                return Err(FleetError::Unapproved {
                    bot_id: bot.id.clone(),
                    reason: "approval pending".to_string(),
                });
            }
            ApprovalState::Rejected => {
                return Err(FleetError::Unapproved {
                    bot_id: bot.id.clone(),
                    reason: "rejected".to_string(),
                });
            }
        }
        if let Some(expires_at) = &bot.approval_expires_at
            && let Ok(expires_at) = chrono::DateTime::parse_from_rfc3339(expires_at)
            && expires_at.with_timezone(&chrono::Utc) < chrono::Utc::now()
        {
            return Err(FleetError::Unapproved {
                bot_id: bot.id.clone(),
                reason: "approval expired".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_session(&self, bot_id: &str) -> BotSession {
        self.sessions
            .entry(bot_id.to_string())
            .or_insert_with(|| BotSession::new(bot_id, self.deps.clone(), self.settings.clone()))
            .clone()
    }

    pub async fn start_bot(&self, bot_id: &str) -> Result<(), FleetError> {
        let bot = self.require_bot(bot_id).await?;
        Self::check_approval(&bot)?;
        self.ensure_session(bot_id).start().await
    }

    pub async fn stop_bot(&self, bot_id: &str) -> Result<(), FleetError> {
        self.require_bot(bot_id).await?;
        match self.session(bot_id) {
            Some(session) => session.stop().await,
            // Never started in this process; nothing to tear down.
            None => Ok(()),
        }
    }

    pub async fn restart_bot(&self, bot_id: &str) -> Result<(), FleetError> {
        let bot = self.require_bot(bot_id).await?;
        Self::check_approval(&bot)?;
        self.ensure_session(bot_id).restart().await
    }

    /// Execute a management action against a locally-owned bot. Shared by
    /// the admin API and the relay endpoint.
    pub async fn apply_action(&self, bot_id: &str, action: BotAction) -> Result<(), FleetError> {
        match action {
            BotAction::Start => self.start_bot(bot_id).await,
            BotAction::Stop => self.stop_bot(bot_id).await,
            BotAction::Restart => self.restart_bot(bot_id).await,
        }
    }

    /// Start every approved bot. Called at boot; failures are logged and
    /// skipped so one broken bot cannot block the rest of the fleet.
    pub async fn resume_approved(&self) -> Result<usize, FleetError> {
        let bots = self
            .deps
            .store
            .list_bots(Some(ApprovalState::Approved))
            .await?;
        let mut started = 0;
        for bot in bots {
            match self.start_bot(&bot.id).await {
                Ok(()) => started += 1,
                Err(e) => warn!(bot_id = %bot.id, error = %e, "resume failed"),
            }
        }
        info!(started, "resumed approved bots");
        Ok(started)
    }

    /// Stop every session. Called on graceful shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<BotSession> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        for session in sessions {
            if let Err(e) = session.stop().await {
                warn!(bot_id = %session.bot_id(), error = %e, "session stop failed");
            }
        }
        info!("fleet shut down");
    }
}
