//! Handler registry: block ID → `BlockHandler`.
//!
//! Filled once while building the executor and never mutated afterwards, so
//! one registry safely serves every concurrent run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nodes::{default_handlers, BlockHandler, BuiltinBlock, Collaborators};

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn BlockHandler>>,
}

impl HandlerRegistry {
    /// An empty registry. Every block is a dead end until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every bundled block, wired to `collaborators`.
    pub fn with_defaults(collaborators: &Collaborators) -> Self {
        default_handlers(collaborators)
            .into_iter()
            .fold(Self::new(), |registry, (block, handler)| {
                registry.register_builtin(block, handler)
            })
    }

    /// Register (or replace) the handler for `block_id`.
    pub fn register(mut self, block_id: impl Into<String>, handler: Arc<dyn BlockHandler>) -> Self {
        self.handlers.insert(block_id.into(), handler);
        self
    }

    /// Replace the handler of a bundled block.
    pub fn register_builtin(self, block: BuiltinBlock, handler: Arc<dyn BlockHandler>) -> Self {
        self.register(block.as_str(), handler)
    }

    pub fn get(&self, block_id: &str) -> Option<&Arc<dyn BlockHandler>> {
        self.handlers.get(block_id)
    }

    pub fn contains(&self, block_id: &str) -> bool {
        self.handlers.contains_key(block_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered block IDs, sorted.
    pub fn block_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("blocks", &self.block_ids())
            .finish()
    }
}
