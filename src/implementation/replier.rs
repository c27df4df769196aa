//! Service replier capability.
//!
//! Shares `HandlerRegistry`'s shape with the local-subscription table, but
//! an entry here produces a response instead of just observing a message.
//! `Node::request`'s in-process fast path invokes it directly.

use crate::implementation::handler_registry::Registered;
use crate::message::AnyMessage;

pub trait Replier: Registered {
    /// Runs the registered service callback against an erased request and
    /// returns an erased response, or `None` if `request` did not downcast
    /// to the type this replier expects. `Node::request` downcasts the
    /// response back to the concrete reply type the caller asked for.
    fn invoke(&self, request: &dyn AnyMessage) -> Option<Box<dyn AnyMessage>>;
}
