//! Transport interface.
//!
//! The wire transport itself (socket types, framing) is out of scope for
//! this crate; this module defines the trait `SharedContext`/`Node` call
//! through, the 5-frame end-of-subscription control message, and an
//! in-memory loopback transport used by tests and as the crate's
//! zero-configuration default.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::types::{FullyQualifiedName, NodeId, CONTROL_SOCKET_LINGER, END_CONNECTION_OPCODE};

#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// `publish(topic, payloadBytes, typeName) -> ok`.
    fn publish(&self, topic: &FullyQualifiedName, payload: &[u8], type_name: &str) -> Result<()>;

    /// Installs the subscription filter for `topic`, called on the first
    /// local subscriber.
    fn add_filter(&self, topic: &FullyQualifiedName);

    /// Removes the subscription filter for `topic`, called once no handlers
    /// remain anywhere in the process.
    fn remove_filter(&self, topic: &FullyQualifiedName);

    /// Opens an ephemeral control socket to `peer_data_address`, sends the
    /// five-frame end-connection message, and closes it with a short
    /// linger. Best-effort: failures are swallowed by the caller, since the
    /// linger ensures the caller is not blocked indefinitely if the peer
    /// has vanished.
    fn send_end_connection(&self, peer_data_address: &str, frame: &EndConnectionFrame) -> Result<()>;
}

/// The five frames of the end-of-subscription control message.
#[derive(Debug)]
pub struct EndConnectionFrame {
    pub topic: FullyQualifiedName,
    pub sender_data_address: String,
    pub sender_node: NodeId,
}

impl EndConnectionFrame {
    /// Encodes the frame as: topic, sender data endpoint, sender node UUID,
    /// the generic-type sentinel, and the decimal ASCII opcode.
    pub fn encode(&self) -> [Vec<u8>; 5] {
        [
            self.topic.as_str().as_bytes().to_vec(),
            self.sender_data_address.as_bytes().to_vec(),
            self.sender_node.to_string().into_bytes(),
            crate::types::GENERIC_MESSAGE_SENTINEL.as_bytes().to_vec(),
            END_CONNECTION_OPCODE.to_string().into_bytes(),
        ]
    }

    pub fn linger() -> std::time::Duration {
        CONTROL_SOCKET_LINGER
    }
}

/// In-memory transport: `publish` records the call for inspection, filters
/// are tracked in a set, and end-connection frames are recorded rather than
/// sent over a real socket.
#[derive(Default)]
pub struct LoopbackTransport {
    published: Mutex<Vec<(FullyQualifiedName, Vec<u8>, String)>>,
    filters: Mutex<std::collections::HashSet<FullyQualifiedName>>,
    end_connections_sent: Mutex<Vec<(String, Vec<Vec<u8>>)>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_messages(&self) -> Vec<(FullyQualifiedName, Vec<u8>, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn has_filter(&self, topic: &FullyQualifiedName) -> bool {
        self.filters.lock().unwrap().contains(topic)
    }

    pub fn end_connections_sent(&self) -> Vec<(String, Vec<Vec<u8>>)> {
        self.end_connections_sent.lock().unwrap().clone()
    }
}

impl Transport for LoopbackTransport {
    fn publish(&self, topic: &FullyQualifiedName, payload: &[u8], type_name: &str) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic.clone(), payload.to_vec(), type_name.to_string()));
        Ok(())
    }

    fn add_filter(&self, topic: &FullyQualifiedName) {
        self.filters.lock().unwrap().insert(topic.clone());
    }

    fn remove_filter(&self, topic: &FullyQualifiedName) {
        self.filters.lock().unwrap().remove(topic);
    }

    fn send_end_connection(&self, peer_data_address: &str, frame: &EndConnectionFrame) -> Result<()> {
        self.end_connections_sent
            .lock()
            .unwrap()
            .push((peer_data_address.to_string(), frame.encode().to_vec()));
        Ok(())
    }
}

/// Lets a test hold on to the same `LoopbackTransport` it hands to
/// `SharedContext::new` (which otherwise takes ownership via `Box<dyn
/// Transport>`), so white-box assertions can inspect what was
/// published/filtered/sent after the fact.
impl Transport for Arc<LoopbackTransport> {
    fn publish(&self, topic: &FullyQualifiedName, payload: &[u8], type_name: &str) -> Result<()> {
        (**self).publish(topic, payload, type_name)
    }

    fn add_filter(&self, topic: &FullyQualifiedName) {
        (**self).add_filter(topic)
    }

    fn remove_filter(&self, topic: &FullyQualifiedName) {
        (**self).remove_filter(topic)
    }

    fn send_end_connection(&self, peer_data_address: &str, frame: &EndConnectionFrame) -> Result<()> {
        (**self).send_end_connection(peer_data_address, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_five_frames_in_order() {
        let frame = EndConnectionFrame {
            topic: FullyQualifiedName::from_raw("p@/a".to_string()),
            sender_data_address: "tcp://127.0.0.1:9000".to_string(),
            sender_node: NodeId::generate(),
        };
        let frames = frame.encode();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], b"p@/a".to_vec());
        assert_eq!(frames[3], crate::types::GENERIC_MESSAGE_SENTINEL.as_bytes());
        assert_eq!(frames[4], b"1".to_vec());
    }
}
