//! The narrow seam messages plug into the routing engine through.
//!
//! Serialization itself is an external message toolkit's concern; the
//! routing engine only ever needs a type name, for the advertise/publish
//! precheck and the remote-subscriber lookup, a way to get bytes out when a
//! remote send is actually required, and a way to be deep-copied before
//! crossing into the worker pool.

use std::any::Any;

/// A message that can flow through `Publisher::publish`.
///
/// `Clone` backs the deep-copy step of the fire-and-forget publish path;
/// `'static` lets the crate erase it behind `dyn AnyMessage` once it reaches
/// the handler registry, whose entries span many unrelated message types.
pub trait Message: Clone + Send + Sync + 'static {
    /// Nominal type name. A property of the *type*, not a given instance:
    /// advertising records it before any message of this type has ever been
    /// constructed, and the publish precheck compares it against the
    /// advertised name without needing a sample value in hand.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Produces the bytes handed to `Transport::publish` for the remote
    /// leg. Only called when `RemoteSubscriberIndex` reports interest.
    fn to_bytes(&self) -> Result<Vec<u8>, String>;
}

/// Type-erased form of `Message`, used by the handler registry so that one
/// table can hold handlers for many unrelated concrete message types.
///
/// A handler's capability contract is `type_name()` plus an `invoke` that
/// receives this erased form and downcasts to the type it actually expects.
pub trait AnyMessage: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;

    /// Owned counterpart to `as_any`, used by `Node::request` to downcast a
    /// boxed reply back to its concrete type without cloning it first.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Message> AnyMessage for T {
    fn type_name(&self) -> &'static str {
        <T as Message>::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
