//! Remote-subscriber index.
//!
//! Per-process record of which fully-qualified topics have remote interest,
//! keyed by type name. Populated by the discovery client when it learns of
//! a remote subscriber; consulted by `Publisher::publish`'s subscriber
//! lookup step under the same `SharedContext` lock as the handler registry.

use std::collections::HashSet;

use crate::types::FullyQualifiedName;

#[derive(Default)]
pub struct RemoteSubscriberIndex {
    table: HashSet<(FullyQualifiedName, String)>,
}

impl RemoteSubscriberIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_interested(&mut self, topic: FullyQualifiedName, type_name: String) {
        self.table.insert((topic, type_name));
    }

    pub fn clear_interest(&mut self, topic: &FullyQualifiedName, type_name: &str) {
        self.table.remove(&(topic.clone(), type_name.to_string()));
    }

    /// Is there remote interest in `topic` for this exact `type_name`?
    pub fn has_remote_subscriber(&self, topic: &FullyQualifiedName, type_name: &str) -> bool {
        self.table.contains(&(topic.clone(), type_name.to_string()))
    }
}
