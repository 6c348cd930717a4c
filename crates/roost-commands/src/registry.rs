// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command registry: name/alias lookup and category grouping.
//!
//! The registry is built once at startup by the process root and injected
//! where dispatch happens; there is no ambient global registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use roost_core::FleetError;

/// Invocation context handed to a command handler.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub bot_id: String,
    pub sender_id: String,
    pub chat_id: String,
    pub args: Vec<String>,
    pub raw_text: String,
}

/// A command implementation. The optional returned string is the reply sent
/// back to the originating chat.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext) -> Result<Option<String>, FleetError>;
}

/// Metadata and handler for one command.
pub struct CommandDescriptor {
    /// Canonical name, lowercase.
    pub name: String,
    /// Alternative names resolving to this descriptor.
    pub aliases: Vec<String>,
    /// Grouping used by the menu.
    pub category: String,
    /// One-line description shown in the menu.
    pub description: String,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(
        name: &str,
        category: &str,
        description: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.to_lowercase(),
            aliases: Vec::new(),
            category: category.to_string(),
            description: description.to_string(),
            handler,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_lowercase()).collect();
        self
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .finish()
    }
}

/// Registry of commands, indexed by canonical name and every alias.
#[derive(Default)]
pub struct CommandRegistry {
    by_name: HashMap<String, Arc<CommandDescriptor>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. The last registration for a canonical name
    /// wins: previous alias mappings of the replaced descriptor are removed
    /// so stale aliases cannot resolve to it.
    pub fn register(&mut self, descriptor: CommandDescriptor) {
        let canonical = descriptor.name.clone();
        self.by_name
            .retain(|_, existing| existing.name != canonical);

        let descriptor = Arc::new(descriptor);
        for alias in &descriptor.aliases {
            self.by_name.insert(alias.clone(), Arc::clone(&descriptor));
        }
        // Canonical name inserted last so an alias collision never shadows it.
        self.by_name.insert(canonical, descriptor);
    }

    /// Case-insensitive lookup by canonical name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Deduplicated canonical descriptors grouped by category, each group
    /// sorted by name.
    pub fn list_by_category(&self) -> BTreeMap<String, Vec<Arc<CommandDescriptor>>> {
        let mut groups: BTreeMap<String, Vec<Arc<CommandDescriptor>>> = BTreeMap::new();
        for (key, descriptor) in &self.by_name {
            // Canonical entries only; alias keys point at the same descriptor.
            if key == &descriptor.name {
                groups
                    .entry(descriptor.category.clone())
                    .or_default()
                    .push(Arc::clone(descriptor));
            }
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.name.cmp(&b.name));
        }
        groups
    }

    /// Number of distinct commands (aliases not counted).
    pub fn len(&self) -> usize {
        self.by_name
            .iter()
            .filter(|(key, d)| *key == &d.name)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
