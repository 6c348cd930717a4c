// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command registry and dispatch for the Roost bot fleet.
//!
//! Commands are registered once at startup into an explicitly constructed
//! [`CommandRegistry`]; dispatch turns prefixed inbound text into a typed
//! [`DispatchOutcome`] and never lets a handler failure escape.

pub mod builtin;
pub mod dispatch;
pub mod registry;

pub use builtin::default_registry;
pub use dispatch::{DispatchOutcome, dispatch, parse_command};
pub use registry::{CommandContext, CommandDescriptor, CommandHandler, CommandRegistry};
