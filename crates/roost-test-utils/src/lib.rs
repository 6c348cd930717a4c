// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Roost integration tests.
//!
//! Deterministic stand-ins for the two external collaborators: a scriptable
//! [`MockTransport`] and an in-memory [`MemoryStore`].

pub mod memory_store;
pub mod mock_transport;

pub use memory_store::MemoryStore;
pub use mock_transport::{MockConnection, MockTransport};
