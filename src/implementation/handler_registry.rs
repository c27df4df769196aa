//! Handler registry.
//!
//! Per-process table of local subscription handlers, parameterized over the
//! capability trait so the exact same table shape backs both the
//! subscription table and the replier table. All operations here execute
//! under the caller-held `SharedContext` lock; the registry is not
//! independently synchronized.

use std::collections::HashMap;
use std::sync::Arc;

use crate::message::AnyMessage;
use crate::types::{FullyQualifiedName, HandlerId, NodeId};

/// What a handler does with a delivered message, alongside the
/// partition-stripped topic it was delivered on.
pub struct MessageInfo {
    pub topic: String,
}

/// Minimal capability every registry entry exposes: the type name it was
/// registered under (possibly `types::GENERIC_MESSAGE_SENTINEL`). Both
/// `Handler` and `Replier` extend this so one `HandlerRegistry<H>` can back
/// either table.
pub trait Registered: Send + Sync {
    fn type_name(&self) -> &str;
}

/// The narrow capability contract every registered local subscriber
/// exposes: a type name plus an invoke that receives the delivered message
/// and its `MessageInfo`.
pub trait Handler: Registered {
    fn run_local_callback(&self, msg: &dyn AnyMessage, info: &MessageInfo);
}

/// Matches a handler's registered type name against a message's actual
/// type name, honoring the generic sentinel.
pub fn type_matches(handler_type: &str, message_type: &str) -> bool {
    handler_type == message_type || handler_type == crate::types::GENERIC_MESSAGE_SENTINEL
}

type HandlersByHandlerId<H> = HashMap<HandlerId, Arc<H>>;
type HandlersByNode<H> = HashMap<NodeId, HandlersByHandlerId<H>>;

pub struct HandlerRegistry<H: ?Sized + Registered> {
    table: HashMap<FullyQualifiedName, HandlersByNode<H>>,
}

impl<H: ?Sized + Registered> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self {
            table: HashMap::new(),
        }
    }
}

impl<H: ?Sized + Registered> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        topic: FullyQualifiedName,
        node: NodeId,
        handler_id: HandlerId,
        handler: Arc<H>,
    ) {
        self.table
            .entry(topic)
            .or_default()
            .entry(node)
            .or_default()
            .insert(handler_id, handler);
    }

    /// Returns whether any entry under `topic` matches `type_name`
    /// (including the generic sentinel), used by `Publisher::has_connections`.
    pub fn first_handler(&self, topic: &FullyQualifiedName, type_name: &str) -> bool {
        self.table
            .get(topic)
            .map(|by_node| {
                by_node
                    .values()
                    .flat_map(|by_handler| by_handler.values())
                    .any(|h| type_matches(h.type_name(), type_name))
            })
            .unwrap_or(false)
    }

    pub fn handlers_by_node(&self, topic: &FullyQualifiedName) -> Option<&HandlersByNode<H>> {
        self.table.get(topic)
    }

    /// Snapshot of every entry under `topic` whose registered type matches
    /// `type_name` (or the generic sentinel), cloned out as `Arc`s so the
    /// caller can invoke them after releasing the registry lock. The
    /// worker-pool dispatch step never runs handlers while holding the
    /// `SharedContext` lock.
    pub fn matching_handlers(&self, topic: &FullyQualifiedName, type_name: &str) -> Vec<Arc<H>> {
        self.table
            .get(topic)
            .map(|by_node| {
                by_node
                    .values()
                    .flat_map(|by_handler| by_handler.values())
                    .filter(|h| type_matches(h.type_name(), type_name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes all entries owned by `node` for `topic`. Returns true if any
    /// were removed.
    pub fn remove_handlers_for_node(&mut self, topic: &FullyQualifiedName, node: NodeId) -> bool {
        let Some(by_node) = self.table.get_mut(topic) else {
            return false;
        };
        let removed = by_node.remove(&node).is_some();
        if by_node.is_empty() {
            self.table.remove(topic);
        }
        removed
    }

    /// No entries for a destroyed node may remain anywhere in the table.
    /// Called from `Node`'s destructor for every topic it still held
    /// handlers for.
    pub fn has_handlers_for_topic(&self, topic: &FullyQualifiedName) -> bool {
        self.table.get(topic).is_some_and(|by_node| !by_node.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(&'static str);
    impl Registered for Stub {
        fn type_name(&self) -> &str {
            self.0
        }
    }
    impl Handler for Stub {
        fn run_local_callback(&self, _msg: &dyn AnyMessage, _info: &MessageInfo) {}
    }

    fn topic(s: &str) -> FullyQualifiedName {
        FullyQualifiedName::from_raw(s.to_string())
    }

    #[test]
    fn generic_sentinel_matches_any_type() {
        assert!(type_matches(crate::types::GENERIC_MESSAGE_SENTINEL, "Foo"));
        assert!(type_matches("Foo", "Foo"));
        assert!(!type_matches("Foo", "Bar"));
    }

    #[test]
    fn filter_disappears_once_last_handler_is_removed() {
        let mut reg: HandlerRegistry<dyn Handler> = HandlerRegistry::new();
        let t = topic("p@/a");
        let node = NodeId::generate();
        reg.insert(t.clone(), node, HandlerId::generate(), Arc::new(Stub("T")));
        assert!(reg.has_handlers_for_topic(&t));

        reg.remove_handlers_for_node(&t, node);
        assert!(!reg.has_handlers_for_topic(&t));
    }

    #[test]
    fn matching_handlers_snapshot_respects_type() {
        let mut reg: HandlerRegistry<dyn Handler> = HandlerRegistry::new();
        let t = topic("p@/a");
        reg.insert(t.clone(), NodeId::generate(), HandlerId::generate(), Arc::new(Stub("T")));
        assert_eq!(reg.matching_handlers(&t, "T").len(), 1);
        assert_eq!(reg.matching_handlers(&t, "U").len(), 0);
    }
}
