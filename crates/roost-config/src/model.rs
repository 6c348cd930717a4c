// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Roost bot fleet.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Roost configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoostConfig {
    /// Server identity, bind address, and peer map.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bot session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Reactive feature service settings.
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Server identity and management-plane configuration.
///
/// `name` is the tenancy identity this process claims registry entries
/// under; it must be unique across the deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Unique name of this server process within the deployment.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Host address to bind the management gateway.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the management gateway.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the management API and incoming relay calls.
    /// `None` leaves the gateway fail-closed (all requests rejected).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Peer server base URLs by server name, used to relay cross-tenancy
    /// actions to the owning process.
    #[serde(default)]
    pub peers: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
            peers: BTreeMap::new(),
        }
    }
}

fn default_server_name() -> String {
    "roost".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file. Shared between server processes
    /// in multi-server deployments.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("roost").join("roost.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("roost.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Bot session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Prefix that marks inbound text as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Base reconnect delay in seconds. Actual delay is
    /// `min(base * attempts, cap)`.
    #[serde(default = "default_reconnect_base_secs")]
    pub reconnect_base_secs: u64,

    /// Reconnect delay ceiling in seconds.
    #[serde(default = "default_reconnect_cap_secs")]
    pub reconnect_cap_secs: u64,

    /// Settle delay between stop() and start() during a restart.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    /// Heartbeat interval while online.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Deadline for outbound sends; exceeding it returns a typed timeout.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            reconnect_base_secs: default_reconnect_base_secs(),
            reconnect_cap_secs: default_reconnect_cap_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_command_prefix() -> String {
    ".".to_string()
}

fn default_reconnect_base_secs() -> u64 {
    5
}

fn default_reconnect_cap_secs() -> u64 {
    300
}

fn default_settle_delay_secs() -> u64 {
    2
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Reactive feature service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    /// Directory for staged capture media.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Aggregate scratch size that triggers a sweep, in bytes.
    #[serde(default = "default_scratch_max_bytes")]
    pub scratch_max_bytes: u64,

    /// Default throttle between status view receipts, per bot.
    #[serde(default = "default_status_throttle_secs")]
    pub status_view_throttle_secs: u64,

    /// Default throttle between status reactions, per bot.
    #[serde(default = "default_status_throttle_secs")]
    pub status_react_throttle_secs: u64,

    /// Maximum cached deleted-message summaries per bot.
    #[serde(default = "default_deleted_cache_capacity")]
    pub deleted_cache_capacity: usize,

    /// Cap on cached/forwarded text summaries, in characters.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            scratch_max_bytes: default_scratch_max_bytes(),
            status_view_throttle_secs: default_status_throttle_secs(),
            status_react_throttle_secs: default_status_throttle_secs(),
            deleted_cache_capacity: default_deleted_cache_capacity(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

fn default_scratch_dir() -> String {
    dirs::cache_dir()
        .map(|p| p.join("roost").join("scratch"))
        .unwrap_or_else(|| std::path::PathBuf::from("scratch"))
        .to_string_lossy()
        .into_owned()
}

fn default_scratch_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_status_throttle_secs() -> u64 {
    3
}

fn default_deleted_cache_capacity() -> usize {
    512
}

fn default_summary_max_chars() -> usize {
    2000
}
