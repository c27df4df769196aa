//! Shared transport context.
//!
//! Process-wide (or test-instantiable) singleton owning the registries,
//! discovery clients, transport and worker pool: one struct holding several
//! guarded collaborators plus shared handles to the things built on top of
//! it.
//!
//! `state` is a `parking_lot::ReentrantMutex` around a `RefCell`, which lets
//! the same thread lock it more than once (needed since some call paths
//! reenter from within a callback that already holds it), but the `RefCell`
//! still only allows one live mutable borrow at a time. `with_state` must
//! not be called again from within its own closure on the same thread; the
//! mutex would grant the second lock, but the nested `borrow_mut()` panics.
//! Callers must scope each `with_state` call narrowly and let it return
//! before starting another. The lock ordering rule is the same in reverse:
//! never acquire the context lock while holding a publisher mutex.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::error::Result;
use crate::implementation::discovery::{
    DiscoveryClient, LoopbackDiscovery, LoopbackServiceDiscovery, MessagePublisher,
    ServiceDiscoveryClient,
};
use crate::implementation::handler_registry::{Handler, HandlerRegistry};
use crate::implementation::remote_subscriber_index::RemoteSubscriberIndex;
use crate::implementation::replier::Replier;
use crate::implementation::transport::{EndConnectionFrame, LoopbackTransport, Transport};
use crate::implementation::worker_pool::WorkerPool;
use crate::types::{FullyQualifiedName, HandlerId, NodeId, ProcessId};

pub(crate) struct ContextState {
    pub local_subscriptions: HandlerRegistry<dyn Handler>,
    pub remote_subscribers: RemoteSubscriberIndex,
    pub repliers: HandlerRegistry<dyn Replier>,
    pub discovery: Box<dyn DiscoveryClient>,
    pub service_discovery: Box<dyn ServiceDiscoveryClient>,
    pub transport: Box<dyn Transport>,
}

pub struct SharedContext {
    state: ReentrantMutex<RefCell<ContextState>>,
    process_id: ProcessId,
    data_address: String,
    control_address: String,
    worker_pool: WorkerPool,
}

impl SharedContext {
    pub fn new(
        discovery: Box<dyn DiscoveryClient>,
        service_discovery: Box<dyn ServiceDiscoveryClient>,
        transport: Box<dyn Transport>,
        data_address: impl Into<String>,
        control_address: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: ReentrantMutex::new(RefCell::new(ContextState {
                local_subscriptions: HandlerRegistry::new(),
                remote_subscribers: RemoteSubscriberIndex::new(),
                repliers: HandlerRegistry::new(),
                discovery,
                service_discovery,
                transport,
            })),
            process_id: ProcessId::generate(),
            data_address: data_address.into(),
            control_address: control_address.into(),
            worker_pool: WorkerPool::new(),
        })
    }

    /// Zero-configuration default: loopback discovery and transport, useful
    /// for single-process applications and in-process testing.
    pub fn process_default() -> Arc<Self> {
        Self::new(
            Box::new(LoopbackDiscovery::new()),
            Box::new(LoopbackServiceDiscovery::new()),
            Box::new(LoopbackTransport::new()),
            "inproc://netbus/data",
            "inproc://netbus/control",
        )
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn data_address(&self) -> &str {
        &self.data_address
    }

    pub fn control_address(&self) -> &str {
        &self.control_address
    }

    pub fn worker_pool(&self) -> WorkerPool {
        self.worker_pool.clone()
    }

    /// Runs `f` with exclusive access to the registries and collaborators.
    /// Calling `with_state` again from within `f`, on the same thread,
    /// panics on the inner `RefCell::borrow_mut()`. The outer mutex is
    /// reentrant so the lock itself is granted, but the borrow is not; `f`
    /// must finish and drop its borrow before the next call.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    /// Installs the transport filter the first time any handler is
    /// registered for `topic`, and removes it once none remain.
    pub(crate) fn sync_filter_for_topic(state: &mut ContextState, topic: &FullyQualifiedName) {
        if state.local_subscriptions.has_handlers_for_topic(topic) {
            state.transport.add_filter(topic);
        } else {
            state.transport.remove_filter(topic);
        }
    }

    pub fn publishers_by_node(
        &self,
        process: ProcessId,
        node: crate::types::NodeId,
    ) -> Vec<crate::implementation::discovery::MessagePublisher> {
        self.with_state(|s| s.discovery.publishers_by_node(process, node))
    }

    pub fn topic_list(&self) -> Vec<FullyQualifiedName> {
        self.with_state(|s| s.discovery.topic_list())
    }

    pub fn service_list(&self) -> Vec<FullyQualifiedName> {
        self.with_state(|s| s.service_discovery.service_list())
    }

    pub fn publishers(
        &self,
        topic: &FullyQualifiedName,
    ) -> HashMap<ProcessId, Vec<crate::implementation::discovery::MessagePublisher>> {
        self.with_state(|s| s.discovery.publishers(topic))
    }

    pub fn wait_for_init(&self) {
        self.with_state(|s| {
            s.discovery.wait_for_init();
            s.service_discovery.wait_for_init();
        });
    }

    pub(crate) fn publish_remote(
        &self,
        topic: &FullyQualifiedName,
        payload: &[u8],
        type_name: &str,
    ) -> Result<()> {
        self.with_state(|s| s.transport.publish(topic, payload, type_name))
    }

    /// Registers with discovery before the first publish can observe
    /// remote interest.
    pub(crate) fn advertise_publisher(&self, publisher: MessagePublisher) -> Result<()> {
        self.with_state(|s| s.discovery.advertise(publisher))
    }

    /// Asks discovery to discover the topic.
    pub(crate) fn discover(&self, topic: &FullyQualifiedName) -> Result<()> {
        self.with_state(|s| s.discovery.discover(topic))
    }

    pub fn service_providers(&self, service: &FullyQualifiedName) -> Vec<(ProcessId, NodeId)> {
        self.with_state(|s| s.service_discovery.providers(service))
    }

    /// Called when the last `Publisher` handle for `topic` owned by `node`
    /// is dropped.
    pub(crate) fn unadvertise(&self, topic: &FullyQualifiedName, node: NodeId) -> Result<()> {
        self.with_state(|s| s.discovery.unadvertise(topic, node))
    }

    pub(crate) fn advertise_service(
        &self,
        service: FullyQualifiedName,
        node: NodeId,
    ) -> Result<()> {
        self.with_state(|s| s.service_discovery.advertise(service, self.process_id, node))
    }

    pub(crate) fn unadvertise_service(
        &self,
        service: &FullyQualifiedName,
        node: NodeId,
    ) -> Result<()> {
        self.with_state(|s| s.service_discovery.unadvertise(service, node))
    }

    /// Inserts the handler and syncs the transport filter while still
    /// holding the lock, so no message can slip through between the two
    /// steps.
    pub(crate) fn register_local_handler(
        &self,
        topic: FullyQualifiedName,
        node: NodeId,
        handler_id: HandlerId,
        handler: Arc<dyn Handler>,
    ) {
        self.with_state(|s| {
            s.local_subscriptions.insert(topic.clone(), node, handler_id, handler);
            Self::sync_filter_for_topic(s, &topic);
        });
    }

    /// Removes every handler `node` owns for `topic`, then drops the
    /// filter if nothing is left.
    pub(crate) fn unregister_local_handlers(
        &self,
        topic: &FullyQualifiedName,
        node: NodeId,
    ) -> bool {
        self.with_state(|s| {
            let removed = s.local_subscriptions.remove_handlers_for_node(topic, node);
            Self::sync_filter_for_topic(s, topic);
            removed
        })
    }

    pub(crate) fn register_replier(
        &self,
        service: FullyQualifiedName,
        node: NodeId,
        handler_id: HandlerId,
        replier: Arc<dyn Replier>,
    ) {
        self.with_state(|s| s.repliers.insert(service, node, handler_id, replier));
    }

    pub(crate) fn unregister_repliers(&self, service: &FullyQualifiedName, node: NodeId) -> bool {
        self.with_state(|s| s.repliers.remove_handlers_for_node(service, node))
    }

    pub(crate) fn matching_repliers(
        &self,
        service: &FullyQualifiedName,
        type_name: &str,
    ) -> Vec<Arc<dyn Replier>> {
        self.with_state(|s| s.repliers.matching_handlers(service, type_name))
    }

    pub(crate) fn matching_local_handlers(
        &self,
        topic: &FullyQualifiedName,
        type_name: &str,
    ) -> Vec<Arc<dyn Handler>> {
        self.with_state(|s| s.local_subscriptions.matching_handlers(topic, type_name))
    }

    pub(crate) fn has_local_subscriber(&self, topic: &FullyQualifiedName, type_name: &str) -> bool {
        self.with_state(|s| s.local_subscriptions.first_handler(topic, type_name))
    }

    pub(crate) fn has_remote_subscriber(&self, topic: &FullyQualifiedName, type_name: &str) -> bool {
        self.with_state(|s| s.remote_subscribers.has_remote_subscriber(topic, type_name))
    }

    /// Records remote interest learned by discovery. Discovery's actual
    /// wire protocol is out of scope; this is the seam a real discovery
    /// client would call into, and the seam tests use to simulate a remote
    /// subscriber.
    pub fn mark_remote_interest(&self, topic: FullyQualifiedName, type_name: impl Into<String>) {
        self.with_state(|s| s.remote_subscribers.mark_interested(topic, type_name.into()));
    }

    pub fn clear_remote_interest(&self, topic: &FullyQualifiedName, type_name: &str) {
        self.with_state(|s| s.remote_subscribers.clear_interest(topic, type_name));
    }

    /// Best-effort notice to every known remote publisher of `topic` that
    /// this node is tearing down.
    pub(crate) fn notify_unsubscribe(
        &self,
        topic: &FullyQualifiedName,
        sender_node: NodeId,
    ) {
        let data_address = self.data_address.to_string();
        let peers: Vec<String> = self.with_state(|s| {
            s.discovery
                .publishers(topic)
                .into_values()
                .flatten()
                .map(|p| p.data_address)
                .collect()
        });
        let frame = EndConnectionFrame {
            topic: topic.clone(),
            sender_data_address: data_address,
            sender_node,
        };
        self.with_state(|s| {
            for peer in &peers {
                if let Err(err) = s.transport.send_end_connection(peer, &frame) {
                    log::debug!("end-connection notice to '{peer}' for '{topic}' failed: {err}");
                }
            }
        });
    }
}
