// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch boundary: prefixed text in, typed outcome out.
//!
//! Nothing in here returns an error to the session: an unknown name is a
//! [`DispatchOutcome::NotFound`] value and a failing handler becomes
//! [`DispatchOutcome::Failed`], so a broken command can never take down the
//! bot's event pump.

use tracing::{debug, warn};

use crate::registry::{CommandContext, CommandRegistry};

/// Typed result of dispatching one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No descriptor registered under the given name.
    NotFound { name: String },
    /// The handler ran; `reply` is its optional chat response.
    Completed {
        command: String,
        reply: Option<String>,
    },
    /// The handler returned an error, caught here.
    Failed { command: String, message: String },
}

/// Split prefixed text into (lowercased name, args).
///
/// Returns `None` for text that is not a command: no prefix, a bare prefix,
/// or whitespace directly after the prefix.
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let rest = text.strip_prefix(prefix)?;
    let first = rest.chars().next()?;
    if first.is_whitespace() {
        return None;
    }
    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let args = parts.map(str::to_string).collect();
    Some((name, args))
}

/// Look up `name` and invoke its handler with `ctx`.
pub async fn dispatch(
    registry: &CommandRegistry,
    name: &str,
    ctx: &CommandContext,
) -> DispatchOutcome {
    let Some(descriptor) = registry.get(name) else {
        debug!(name, bot_id = %ctx.bot_id, "unknown command");
        return DispatchOutcome::NotFound {
            name: name.to_string(),
        };
    };

    match descriptor.handler.handle(ctx).await {
        Ok(reply) => DispatchOutcome::Completed {
            command: descriptor.name.clone(),
            reply,
        },
        Err(e) => {
            warn!(
                command = %descriptor.name,
                bot_id = %ctx.bot_id,
                error = %e,
                "command handler failed"
            );
            DispatchOutcome::Failed {
                command: descriptor.name.clone(),
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use roost_core::FleetError;

    use super::*;
    use crate::registry::{CommandDescriptor, CommandHandler};

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, FleetError> {
            Ok(Some(ctx.args.join(" ")))
        }
    }

    struct Exploding;

    #[async_trait]
    impl CommandHandler for Exploding {
        async fn handle(&self, _ctx: &CommandContext) -> Result<Option<String>, FleetError> {
            Err(FleetError::Internal("boom".into()))
        }
    }

    fn ctx(raw: &str, args: &[&str]) -> CommandContext {
        CommandContext {
            bot_id: "b1".into(),
            sender_id: "sender".into(),
            chat_id: "chat".into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            raw_text: raw.into(),
        }
    }

    #[test]
    fn parse_splits_name_and_args() {
        assert_eq!(
            parse_command(".echo hello world", "."),
            Some(("echo".to_string(), vec!["hello".into(), "world".into()]))
        );
        assert_eq!(parse_command(".PING", "."), Some(("ping".to_string(), vec![])));
    }

    #[test]
    fn parse_rejects_non_commands() {
        assert_eq!(parse_command("hello", "."), None);
        assert_eq!(parse_command(".", "."), None);
        assert_eq!(parse_command(". spaced", "."), None);
        assert_eq!(parse_command("!ping", "."), None);
    }

    #[test]
    fn parse_supports_multi_char_prefixes() {
        assert_eq!(
            parse_command("//ping", "//"),
            Some(("ping".to_string(), vec![]))
        );
    }

    #[tokio::test]
    async fn unknown_command_is_a_value_not_an_error() {
        let registry = CommandRegistry::new();
        let outcome = dispatch(&registry, "nope", &ctx(".nope", &[])).await;
        assert_eq!(
            outcome,
            DispatchOutcome::NotFound {
                name: "nope".into()
            }
        );
    }

    #[tokio::test]
    async fn completed_carries_the_reply() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDescriptor::new(
            "echo",
            "general",
            "echo args",
            Arc::new(Echo),
        ));

        let outcome = dispatch(&registry, "echo", &ctx(".echo a b", &["a", "b"])).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                command: "echo".into(),
                reply: Some("a b".into())
            }
        );
    }

    #[tokio::test]
    async fn handler_error_is_caught_at_the_boundary() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDescriptor::new(
            "boom",
            "general",
            "always fails",
            Arc::new(Exploding),
        ));

        let outcome = dispatch(&registry, "boom", &ctx(".boom", &[])).await;
        match outcome {
            DispatchOutcome::Failed { command, message } => {
                assert_eq!(command, "boom");
                assert!(message.contains("boom"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
