// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./roost.toml` > `~/.config/roost/roost.toml` >
//! `/etc/roost/roost.toml` with environment variable overrides via the
//! `ROOST_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RoostConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/roost/roost.toml` (system-wide)
/// 3. `~/.config/roost/roost.toml` (user XDG config)
/// 4. `./roost.toml` (local directory)
/// 5. `ROOST_*` environment variables
pub fn load_config() -> Result<RoostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RoostConfig::default()))
        .merge(Toml::file("/etc/roost/roost.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("roost/roost.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("roost.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<RoostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RoostConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RoostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RoostConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ROOST_SERVER_BEARER_TOKEN` must map to
/// `server.bearer_token`, not `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("ROOST_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: ROOST_STORAGE_DATABASE_PATH -> "storage_database_path"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("session_", "session.", 1)
            .replacen("features_", "features.", 1);
        mapped.into()
    })
}
