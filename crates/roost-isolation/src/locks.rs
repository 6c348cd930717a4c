// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(bot, command) execution locks.
//!
//! A lock prevents two overlapping slow invocations of the same command on
//! the same bot from interleaving side effects. Acquisition is a single
//! atomic decision under the DashMap shard lock. Release is RAII: the guard
//! frees the lock on Drop, so an erroring or panicking handler cannot hold
//! a lock beyond its 30-second TTL, and a crashed holder self-heals once
//! the TTL lapses.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default lock lifetime.
pub const LOCK_TTL: Duration = Duration::from_secs(30);

/// Sweep interval for abandoned (TTL-expired) lock entries.
pub const LOCK_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct LockEntry {
    holder: String,
    acquired_at: Instant,
}

/// Process-local execution locks keyed by (bot id, command name).
///
/// Clones share the same underlying map.
#[derive(Clone)]
pub struct CommandLocks {
    locks: Arc<DashMap<(String, String), LockEntry>>,
    ttl: Duration,
}

impl Default for CommandLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLocks {
    /// Create a lock map with the default 30s TTL.
    pub fn new() -> Self {
        Self::with_ttl(LOCK_TTL)
    }

    /// Create a lock map with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Try to acquire the lock for (bot, command).
    ///
    /// Returns a guard when no live lock (age < TTL) exists; `None` means
    /// contention and the caller drops the duplicate invocation. An expired
    /// entry left by a crashed holder is replaced in the same atomic step.
    pub fn acquire(&self, bot_id: &str, command: &str) -> Option<CommandLockGuard> {
        let key = (bot_id.to_string(), command.to_string());
        let holder = uuid::Uuid::new_v4().to_string();
        let entry = LockEntry {
            holder: holder.clone(),
            acquired_at: Instant::now(),
        };

        // The Entry holds the shard lock: check-and-create is atomic.
        match self.locks.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().acquired_at.elapsed() < self.ttl {
                    return None;
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        Some(CommandLockGuard {
            locks: Arc::clone(&self.locks),
            key,
            holder,
        })
    }

    /// True when a live lock exists for (bot, command).
    pub fn is_locked(&self, bot_id: &str, command: &str) -> bool {
        let key = (bot_id.to_string(), command.to_string());
        self.locks
            .get(&key)
            .map(|e| e.acquired_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    /// Remove TTL-expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.locks.len();
        let ttl = self.ttl;
        self.locks.retain(|_, entry| entry.acquired_at.elapsed() < ttl);
        before - self.locks.len()
    }

    /// Number of lock entries, live or expired-but-unswept.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Spawn the owned background sweeper for abandoned entries.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let locks = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("lock sweeper cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let dropped = locks.sweep();
                        if dropped > 0 {
                            debug!(dropped, "lock sweep removed abandoned entries");
                        }
                    }
                }
            }
        })
    }
}

/// RAII guard for an acquired command lock.
///
/// Dropping the guard releases the lock, but only while this acquisition
/// still owns the entry: if the TTL lapsed and another holder re-acquired,
/// the stale guard leaves the newer lock untouched.
pub struct CommandLockGuard {
    locks: Arc<DashMap<(String, String), LockEntry>>,
    key: (String, String),
    holder: String,
}

impl Drop for CommandLockGuard {
    fn drop(&mut self) {
        self.locks
            .remove_if(&self.key, |_, entry| entry.holder == self.holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_acquire_within_ttl_fails() {
        let locks = CommandLocks::new();
        let guard = locks.acquire("b1", "ping");
        assert!(guard.is_some());
        assert!(locks.acquire("b1", "ping").is_none());

        // Different command or bot is unaffected.
        assert!(locks.acquire("b1", "menu").is_some());
        assert!(locks.acquire("b2", "ping").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn release_makes_lock_available_again() {
        let locks = CommandLocks::new();
        let guard = locks.acquire("b1", "ping").expect("first acquire");
        drop(guard);
        assert!(locks.acquire("b1", "ping").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_allows_reacquisition() {
        let locks = CommandLocks::new();
        let _abandoned = locks.acquire("b1", "ping").expect("first acquire");
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(
            locks.acquire("b1", "ping").is_some(),
            "expired lock must be reclaimable"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_guard_does_not_release_newer_lock() {
        let locks = CommandLocks::new();
        let stale = locks.acquire("b1", "ping").expect("first acquire");
        tokio::time::advance(Duration::from_secs(31)).await;

        let _fresh = locks.acquire("b1", "ping").expect("reclaim after TTL");
        drop(stale);

        // The fresh holder's lock must still be live.
        assert!(locks.is_locked("b1", "ping"));
        assert!(locks.acquire("b1", "ping").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn guard_released_on_panic_unwind() {
        let locks = CommandLocks::new();
        let locks_clone = locks.clone();
        let result = tokio::spawn(async move {
            let _guard = locks_clone.acquire("b1", "ping").expect("acquire");
            panic!("handler blew up");
        })
        .await;
        assert!(result.is_err());
        assert!(
            locks.acquire("b1", "ping").is_some(),
            "lock must be free after the holder panicked"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_yield_one_winner() {
        let locks = CommandLocks::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            // Move the guard out so every acquisition stays held until all
            // tasks have finished racing.
            handles.push(tokio::spawn(async move { locks.acquire("b1", "ping") }));
        }
        let mut guards = Vec::new();
        for handle in handles {
            guards.push(handle.await.unwrap());
        }
        let wins = guards.iter().filter(|g| g.is_some()).count();
        assert_eq!(wins, 1, "exactly one concurrent acquire may win");

        drop(guards);
        assert!(!locks.is_locked("b1", "ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reclaims_abandoned_entries() {
        let locks = CommandLocks::new();
        let guard = locks.acquire("b1", "ping").expect("acquire");
        std::mem::forget(guard); // simulate a crashed holder that never drops
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(locks.sweep(), 1);
        assert!(locks.is_empty());
    }
}
