//! Identifiers that already have a marker in the scene

use std::collections::HashSet;
use tracing::{debug, info};

/// Session-scoped set of placed identifiers.
///
/// Identifiers are only added after their marker has been placed, so a
/// detection that could not be anchored is retried on later sightings.
/// There is no per-identifier removal; [`SeenRegistry::clear`] forgets the
/// whole session and is only used by the resume policy.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    identifiers: HashSet<String>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when no marker has been placed for `identifier` yet.
    pub fn is_new(&self, identifier: &str) -> bool {
        if self.identifiers.contains(identifier) {
            debug!(identifier, "already exists");
            return false;
        }
        true
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    /// Record a placed identifier. Returns `false` if it was already present.
    pub fn insert(&mut self, identifier: &str) -> bool {
        let inserted = self.identifiers.insert(identifier.to_string());
        if inserted {
            info!(identifier, total = self.identifiers.len(), "new symbol registered");
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        let forgotten = self.identifiers.len();
        self.identifiers.clear();
        info!(forgotten, "seen registry cleared");
    }
}
