// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport placeholder for builds without a protocol integration.
//!
//! Roost drives a messaging protocol client supplied behind the
//! [`Transport`] trait; the client itself ships as a separate integration
//! crate. A build without one still serves the full admin plane (storage,
//! approval, registry, relay), but starting a bot lands it in `error`
//! status with a clear activity record instead of connecting.

use std::sync::Arc;

use async_trait::async_trait;

use roost_core::FleetError;
use roost_core::traits::{Transport, TransportConnection};

/// A transport that refuses every connection.
pub struct UnconfiguredTransport;

#[async_trait]
impl Transport for UnconfiguredTransport {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn connect(
        &self,
        _credential: Option<Vec<u8>>,
    ) -> Result<Arc<dyn TransportConnection>, FleetError> {
        Err(FleetError::Config(
            "no messaging transport is linked into this build".to_string(),
        ))
    }
}
