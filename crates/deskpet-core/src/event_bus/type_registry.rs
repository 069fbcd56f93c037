//! Advisory registry of known event type names.
//!
//! Purely informational: neither `emit` nor `subscribe` consult it.

use parking_lot::RwLock;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub(crate) struct EventTypeRegistry {
    names: RwLock<BTreeSet<String>>,
}

impl EventTypeRegistry {
    /// Returns `true` if the name was not known before
    pub(crate) fn register(&self, name: &str) -> bool {
        let inserted = self.names.write().insert(name.to_string());
        if inserted {
            tracing::debug!("Event type '{}' registered", name);
        }
        inserted
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    /// Known names in sorted order
    pub(crate) fn names(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }
}
