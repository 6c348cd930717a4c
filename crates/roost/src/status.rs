// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `roost status` command implementation.
//!
//! Reads the configured datastore and prints this server's bots and the
//! cross-server registry.

use roost_config::RoostConfig;
use roost_core::FleetError;
use roost_core::traits::FleetStore;
use roost_storage::SqliteStore;

pub async fn run_status(config: RoostConfig) -> Result<(), FleetError> {
    let store = SqliteStore::new(config.storage.clone(), &config.server.name);
    store.initialize().await?;

    let bots = store.list_bots(None).await?;
    println!("server {} -- {} bot(s)", config.server.name, bots.len());
    for bot in &bots {
        println!(
            "  {:<36} {:<12} {:<9} msgs={:<6} cmds={:<6} identity={}",
            bot.id,
            bot.status,
            bot.approval,
            bot.messages_handled,
            bot.commands_handled,
            bot.external_identity.as_deref().unwrap_or("-"),
        );
    }

    let entries = store.list_registry().await?;
    println!("registry -- {} identit{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    for entry in &entries {
        println!("  {} -> {}", entry.identity, entry.server_name);
    }

    store.close().await?;
    Ok(())
}
