// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenancy relay: executing management actions on bots owned by other
//! server processes.
//!
//! A process never mutates a `BotRecord` it does not own. Instead it POSTs
//! the action to the owning server's `/v1/relay` endpoint with a bearer
//! credential; the owner executes it locally and the response body is
//! relayed back to the caller unchanged.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use roost_core::FleetError;
use roost_core::types::{BotAction, CrossTenancyAction};

/// Wire body of a relay call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRequest {
    pub bot_id: String,
    pub action: BotAction,
}

/// Routes cross-tenancy actions to their owning server.
pub struct TenancyRouter {
    server_name: String,
    peers: BTreeMap<String, String>,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl TenancyRouter {
    pub fn new(
        server_name: &str,
        peers: BTreeMap<String, String>,
        bearer_token: Option<String>,
    ) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FleetError::Relay {
                message: format!("relay client construction failed: {e}"),
                status: None,
            })?;
        Ok(Self {
            server_name: server_name.to_string(),
            peers,
            bearer_token,
            client,
        })
    }

    /// True when this process owns the target server name itself.
    pub fn is_local(&self, owning_server: &str) -> bool {
        owning_server == self.server_name
    }

    /// Relay an action to the owning server and return its response body
    /// unchanged.
    pub async fn relay(
        &self,
        action: &CrossTenancyAction,
    ) -> Result<serde_json::Value, FleetError> {
        let base = self
            .peers
            .get(&action.owning_server)
            .ok_or_else(|| FleetError::not_found("peer server", &action.owning_server))?;
        let url = format!("{}/v1/relay", base.trim_end_matches('/'));

        debug!(
            bot_id = %action.bot_id,
            action = %action.action,
            owner = %action.owning_server,
            "relaying cross-tenancy action"
        );

        let mut request = self.client.post(&url).json(&RelayRequest {
            bot_id: action.bot_id.clone(),
            action: action.action,
        });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| FleetError::Relay {
            message: format!("relay to {} failed: {e}", action.owning_server),
            status: None,
        })?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("no detail");
            return Err(FleetError::Relay {
                message: format!(
                    "{} rejected {} for bot {}: {detail}",
                    action.owning_server, action.action, action.bot_id
                ),
                status: Some(status.as_u16()),
            });
        }

        Ok(body)
    }
}
