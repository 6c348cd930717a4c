// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams for Roost's external collaborators.
//!
//! The transport (messaging protocol client) and the fleet datastore are
//! consumed behind `#[async_trait]` object-safe traits so sessions, services
//! and the gateway can be tested against mocks.

pub mod store;
pub mod transport;

pub use store::FleetStore;
pub use transport::{Transport, TransportConnection};
