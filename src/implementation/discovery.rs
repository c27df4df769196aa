//! Discovery client interface.
//!
//! The discovery protocol itself (beacons, info tables) is out of scope for
//! this crate; this module only defines the narrow traits `SharedContext`
//! talks to, plus an in-memory fake used by tests and as the crate's
//! default loopback-only discovery.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::infrastructure::qos::AdvertiseOptions;
use crate::types::{FullyQualifiedName, NodeId, ProcessId};

/// A publisher advertisement as announced to / resolved from discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePublisher {
    pub topic: FullyQualifiedName,
    pub type_name: String,
    pub data_address: String,
    pub process_id: ProcessId,
    pub node_id: NodeId,
    pub options: AdvertiseOptions,
}

/// Discovery interface for message publishers.
#[cfg_attr(test, mockall::automock)]
pub trait DiscoveryClient: Send + Sync {
    fn advertise(&self, publisher: MessagePublisher) -> Result<()>;
    fn unadvertise(&self, topic: &FullyQualifiedName, node: NodeId) -> Result<()>;
    fn discover(&self, topic: &FullyQualifiedName) -> Result<()>;
    fn publishers(&self, topic: &FullyQualifiedName) -> HashMap<ProcessId, Vec<MessagePublisher>>;
    fn publishers_by_node(&self, process: ProcessId, node: NodeId) -> Vec<MessagePublisher>;
    fn topic_list(&self) -> Vec<FullyQualifiedName>;
    fn wait_for_init(&self);
}

/// Discovery interface for service providers. Same shape as the message
/// half, a distinct table so message and service advertisements never
/// collide.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceDiscoveryClient: Send + Sync {
    fn advertise(&self, service: FullyQualifiedName, process: ProcessId, node: NodeId) -> Result<()>;
    fn unadvertise(&self, service: &FullyQualifiedName, node: NodeId) -> Result<()>;
    fn service_list(&self) -> Vec<FullyQualifiedName>;
    /// Every `(processUUID, nodeUUID)` that currently advertises `service`.
    /// The service-side counterpart to `DiscoveryClient::publishers`, used
    /// by `Node::service_info`.
    fn providers(&self, service: &FullyQualifiedName) -> Vec<(ProcessId, NodeId)>;
    fn wait_for_init(&self);
}

/// An in-memory discovery fake: the only "remote" endpoints it can ever
/// resolve are other nodes that advertised into the same `LoopbackDiscovery`
/// instance. Useful as the crate's zero-configuration default and as the
/// test double in integration tests.
#[derive(Default)]
pub struct LoopbackDiscovery {
    publishers: Mutex<HashMap<FullyQualifiedName, Vec<MessagePublisher>>>,
}

impl LoopbackDiscovery {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiscoveryClient for LoopbackDiscovery {
    fn advertise(&self, publisher: MessagePublisher) -> Result<()> {
        self.publishers
            .lock()
            .unwrap()
            .entry(publisher.topic.clone())
            .or_default()
            .push(publisher);
        Ok(())
    }

    fn unadvertise(&self, topic: &FullyQualifiedName, node: NodeId) -> Result<()> {
        if let Some(list) = self.publishers.lock().unwrap().get_mut(topic) {
            list.retain(|p| p.node_id != node);
        }
        Ok(())
    }

    fn discover(&self, _topic: &FullyQualifiedName) -> Result<()> {
        Ok(())
    }

    fn publishers(&self, topic: &FullyQualifiedName) -> HashMap<ProcessId, Vec<MessagePublisher>> {
        let mut out: HashMap<ProcessId, Vec<MessagePublisher>> = HashMap::new();
        if let Some(list) = self.publishers.lock().unwrap().get(topic) {
            for p in list {
                out.entry(p.process_id).or_default().push(p.clone());
            }
        }
        out
    }

    fn publishers_by_node(&self, process: ProcessId, node: NodeId) -> Vec<MessagePublisher> {
        self.publishers
            .lock()
            .unwrap()
            .values()
            .flatten()
            .filter(|p| p.process_id == process && p.node_id == node)
            .cloned()
            .collect()
    }

    fn topic_list(&self) -> Vec<FullyQualifiedName> {
        self.publishers.lock().unwrap().keys().cloned().collect()
    }

    fn wait_for_init(&self) {}
}

/// Service-side counterpart to `LoopbackDiscovery`.
#[derive(Default)]
pub struct LoopbackServiceDiscovery {
    services: Mutex<HashMap<FullyQualifiedName, Vec<(ProcessId, NodeId)>>>,
}

impl LoopbackServiceDiscovery {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServiceDiscoveryClient for LoopbackServiceDiscovery {
    fn advertise(&self, service: FullyQualifiedName, process: ProcessId, node: NodeId) -> Result<()> {
        self.services
            .lock()
            .unwrap()
            .entry(service)
            .or_default()
            .push((process, node));
        Ok(())
    }

    fn unadvertise(&self, service: &FullyQualifiedName, node: NodeId) -> Result<()> {
        if let Some(list) = self.services.lock().unwrap().get_mut(service) {
            list.retain(|(_, n)| *n != node);
        }
        Ok(())
    }

    fn service_list(&self) -> Vec<FullyQualifiedName> {
        self.services.lock().unwrap().keys().cloned().collect()
    }

    fn providers(&self, service: &FullyQualifiedName) -> Vec<(ProcessId, NodeId)> {
        self.services
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    fn wait_for_init(&self) {}
}
