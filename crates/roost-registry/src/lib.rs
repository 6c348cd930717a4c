// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-server identity registry and tenancy relay for the Roost bot fleet.
//!
//! The registry enforces exactly one owning server per external identity
//! across processes, backed solely by the datastore's uniqueness constraint.
//! The relay forwards management actions to the owning process over HTTP
//! with a bearer credential.

pub mod identity;
pub mod relay;

pub use identity::IdentityRegistry;
pub use relay::{RelayRequest, TenancyRouter};
