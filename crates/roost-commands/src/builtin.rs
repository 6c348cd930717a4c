// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in commands, registered for every bot at startup.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use roost_core::FleetError;

use crate::registry::{CommandContext, CommandDescriptor, CommandHandler, CommandRegistry};

/// Latency echo.
pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, FleetError> {
        Ok(Some("pong".to_string()))
    }
}

/// Renders the command menu from the registry's category listing.
pub struct MenuCommand {
    registry: Weak<CommandRegistry>,
}

#[async_trait]
impl CommandHandler for MenuCommand {
    async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, FleetError> {
        let Some(registry) = self.registry.upgrade() else {
            return Err(FleetError::Internal("command registry dropped".into()));
        };

        let mut menu = String::from("Available commands:\n");
        for (category, descriptors) in registry.list_by_category() {
            menu.push_str(&format!("\n[{category}]\n"));
            for descriptor in descriptors {
                menu.push_str(&format!(
                    "  {} - {}\n",
                    descriptor.name, descriptor.description
                ));
            }
        }
        Ok(Some(menu))
    }
}

/// Build the default registry with all built-in commands.
///
/// `Arc::new_cyclic` lets the menu command hold a weak handle to the very
/// registry it is registered in.
pub fn default_registry() -> Arc<CommandRegistry> {
    Arc::new_cyclic(|weak: &Weak<CommandRegistry>| {
        let mut registry = CommandRegistry::new();
        registry.register(
            CommandDescriptor::new("ping", "general", "check the bot is alive", Arc::new(PingCommand))
                .with_aliases(&["p"]),
        );
        registry.register(
            CommandDescriptor::new(
                "menu",
                "general",
                "list available commands",
                Arc::new(MenuCommand {
                    registry: weak.clone(),
                }),
            )
            .with_aliases(&["help", "commands"]),
        );
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, dispatch};

    fn ctx() -> CommandContext {
        CommandContext {
            bot_id: "b1".into(),
            sender_id: "sender".into(),
            chat_id: "chat".into(),
            args: vec![],
            raw_text: ".ping".into(),
        }
    }

    #[tokio::test]
    async fn ping_replies_pong() {
        let registry = default_registry();
        let outcome = dispatch(&registry, "ping", &ctx()).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                command: "ping".into(),
                reply: Some("pong".into())
            }
        );
    }

    #[tokio::test]
    async fn ping_alias_resolves() {
        let registry = default_registry();
        let outcome = dispatch(&registry, "P", &ctx()).await;
        assert!(matches!(outcome, DispatchOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn menu_lists_all_builtins_once() {
        let registry = default_registry();
        let outcome = dispatch(&registry, "help", &ctx()).await;
        let DispatchOutcome::Completed { reply: Some(menu), .. } = outcome else {
            panic!("expected a menu reply");
        };
        assert!(menu.contains("[general]"));
        assert!(menu.contains("ping"));
        assert_eq!(
            menu.matches("menu").count(),
            1,
            "aliases must not duplicate menu entries"
        );
    }
}
