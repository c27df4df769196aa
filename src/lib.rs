//! A topic-based publish/subscribe and request/reply messaging fabric for
//! processes on a local network. Nodes advertise and subscribe to topics,
//! advertise and invoke services; delivery spans both in-process fan-out
//! and, through the `Transport`/`DiscoveryClient` seams, inter-process
//! transport.
//!
//! The crate ships a loopback-only `Transport`/`DiscoveryClient` pair
//! (`implementation::transport::LoopbackTransport`,
//! `implementation::discovery::LoopbackDiscovery`) sufficient for
//! single-process use and for the test suite; a real deployment supplies
//! its own implementations of those traits to `SharedContext::new`.

pub mod error;
pub mod implementation;
pub mod infrastructure;
pub mod message;
pub mod shutdown;
pub mod topic_name;
pub mod types;

pub use error::{NetBusError, Result};
pub use implementation::discovery::{
    DiscoveryClient, LoopbackDiscovery, LoopbackServiceDiscovery, MessagePublisher,
    ServiceDiscoveryClient,
};
pub use implementation::handler_registry::MessageInfo;
pub use implementation::node::Node;
pub use implementation::publisher::Publisher;
pub use implementation::transport::{EndConnectionFrame, LoopbackTransport, Transport};
pub use implementation::SharedContext;
pub use infrastructure::{AdvertiseOptions, NodeOptions, SubscribeOptions};
pub use message::{AnyMessage, Message};
pub use shutdown::ShutdownCoordinator;
pub use types::{FullyQualifiedName, HandlerId, NodeId, ProcessId};
