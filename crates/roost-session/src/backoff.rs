// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect delay policy.

use std::time::Duration;

/// Delay before reconnect attempt number `attempts` (1-based):
/// `min(base * attempts, cap)`.
pub fn reconnect_delay(base: Duration, cap: Duration, attempts: u32) -> Duration {
    base.saturating_mul(attempts.max(1)).min(cap)
}
