// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-TTL memory of recently seen event keys.
//!
//! The transport can deliver the same message event more than once
//! (reconnect replays, multi-device echoes). The cache suppresses duplicate
//! handling within a 5-second window; entries expire lazily on lookup and
//! actively via a 60-second sweeper task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use roost_core::types::MessageKey;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default entry lifetime.
pub const DEDUP_TTL: Duration = Duration::from_secs(5);

/// Default active sweep interval.
pub const DEDUP_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-bot dedup cache over (message id, chat id, participant id) keys.
///
/// Clones share the same underlying map; construct one per process root and
/// inject it where needed.
#[derive(Clone)]
pub struct DedupCache {
    entries: Arc<DashMap<(String, MessageKey), Instant>>,
    ttl: Duration,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupCache {
    /// Create a cache with the default 5s TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEDUP_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// True when `key` was marked processed for `bot_id` within the TTL.
    ///
    /// An expired entry is removed on the spot and reported as unseen.
    pub fn is_processed(&self, bot_id: &str, key: &MessageKey) -> bool {
        let map_key = (bot_id.to_string(), key.clone());
        // Read the age first and drop the shard guard before any removal.
        let age = self.entries.get(&map_key).map(|e| e.value().elapsed());
        match age {
            Some(age) if age < self.ttl => true,
            Some(_) => {
                self.entries.remove(&map_key);
                false
            }
            None => false,
        }
    }

    /// Record `key` as processed for `bot_id`.
    pub fn mark_processed(&self, bot_id: &str, key: &MessageKey) {
        self.entries
            .insert((bot_id.to_string(), key.clone()), Instant::now());
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, seen_at| seen_at.elapsed() < ttl);
        before - self.entries.len()
    }

    /// Number of live entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the owned background sweeper. It runs until `token` is
    /// cancelled and never blocks request paths.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick is a no-op sweep trigger
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("dedup sweeper cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let dropped = cache.sweep();
                        if dropped > 0 {
                            debug!(dropped, "dedup sweep removed expired entries");
                        }
                    }
                }
            }
        })
    }
}
