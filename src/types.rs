//! Small plain-data types and well-known constants shared across the crate.
//!
//! Value types with no behavior of their own, referenced from every other
//! module in the crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single process participating in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub Uuid);

impl ProcessId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifies a single node within a process. Stable for the node's
/// lifetime and unique across the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A per-handler identity within a single topic's registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// The canonical registry key: `<partition>@<namespace>/<topic>`.
///
/// This is the only form ever stored in the handler registry, the
/// remote-subscriber index, or the replier table; partition stripping
/// happens only at the user-facing view boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FullyQualifiedName(String);

impl FullyQualifiedName {
    /// Callers go through `topic_name::fully_qualify`; this is exposed for
    /// collaborators (discovery fakes, tests) that already hold a valid name.
    pub(crate) fn from_raw(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything up to and including the last `@`, stripped.
    pub fn strip_partition(&self) -> &str {
        match self.0.rfind('@') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// The embedded partition prefix, i.e. everything before the last `@`.
    /// Used by `Node::topic_list`/`service_list` to keep only the names that
    /// belong to the calling node's own partition.
    pub fn partition(&self) -> &str {
        match self.0.rfind('@') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for FullyQualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known type-name sentinel matching a handler that accepts any
/// message type.
pub const GENERIC_MESSAGE_SENTINEL: &str = "*";

/// Opcode carried in frame 5 of the end-of-subscription control message.
pub const END_CONNECTION_OPCODE: u8 = 1;

/// Approximate linger applied to the short-lived control socket opened by
/// `Node::unsubscribe`.
pub const CONTROL_SOCKET_LINGER: std::time::Duration = std::time::Duration::from_millis(200);
