// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin/management HTTP gateway for the Roost bot fleet.
//!
//! Exposes bot lifecycle (start/stop/restart), approval and feature
//! toggles, registry management, cross-tenancy action submission, and the
//! owner-side relay execution endpoint. Everything under `/v1` is guarded
//! by bearer auth; `/health` is public.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, ServerConfig, build_router, start_server};
