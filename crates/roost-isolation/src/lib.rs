// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-bot isolation layer for the Roost bot fleet.
//!
//! Two TTL-bounded structures: a dedup cache absorbing redundant event
//! delivery, and per-(bot, command) execution locks preventing overlapping
//! invocations. Both are process-local in-memory state; correctness depends
//! on exactly one live connection per bot per process, which is enforced
//! operationally, not here.
//!
//! Instances are constructed by the process root and injected -- there is no
//! ambient global state, so tests get full isolation.

pub mod dedup;
pub mod locks;

pub use dedup::{DEDUP_SWEEP_INTERVAL, DEDUP_TTL, DedupCache};
pub use locks::{CommandLockGuard, CommandLocks, LOCK_SWEEP_INTERVAL, LOCK_TTL};

use tokio_util::sync::CancellationToken;

/// The dedup cache and lock map bundled for injection into sessions.
///
/// Clones share state with the original.
#[derive(Clone, Default)]
pub struct IsolationLayer {
    pub dedup: DedupCache,
    pub locks: CommandLocks,
}

impl IsolationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn both background sweepers, owned by the caller via the returned
    /// handles and stopped by cancelling `token`.
    pub fn spawn_sweepers(
        &self,
        token: &CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.dedup.spawn_sweeper(DEDUP_SWEEP_INTERVAL, token.clone()),
            self.locks.spawn_sweeper(LOCK_SWEEP_INTERVAL, token.clone()),
        ]
    }
}
