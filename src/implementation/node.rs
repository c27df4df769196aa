//! Node.
//!
//! A node is the user-facing entry point: it owns a set of advertisements,
//! subscriptions and advertised services scoped under one `NodeOptions`
//! partition/namespace pair, and tears all three down on `Drop`. A handle
//! holding a back-reference to shared process state plus its own small
//! bookkeeping, guarded by a plain mutex rather than the shared context's
//! reentrant one.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{NetBusError, Result};
use crate::implementation::context::SharedContext;
use crate::implementation::discovery::MessagePublisher;
use crate::implementation::handler_registry::{Handler, MessageInfo, Registered};
use crate::implementation::publisher::Publisher;
use crate::implementation::replier::Replier;
use crate::infrastructure::qos::{AdvertiseOptions, NodeOptions};
use crate::message::{AnyMessage, Message};
use crate::topic_name;
use crate::types::{FullyQualifiedName, HandlerId, NodeId, ProcessId};

struct TypedHandler<T, F> {
    type_name: &'static str,
    callback: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> Registered for TypedHandler<T, F>
where
    T: Message,
    F: Fn(&T, &MessageInfo) + Send + Sync,
{
    fn type_name(&self) -> &str {
        self.type_name
    }
}

impl<T, F> Handler for TypedHandler<T, F>
where
    T: Message,
    F: Fn(&T, &MessageInfo) + Send + Sync,
{
    fn run_local_callback(&self, msg: &dyn AnyMessage, info: &MessageInfo) {
        match msg.as_any().downcast_ref::<T>() {
            Some(typed) => (self.callback)(typed, info),
            None => log::warn!(
                "handler for '{}' expected type '{}', got '{}'",
                info.topic,
                self.type_name,
                msg.type_name()
            ),
        }
    }
}

/// A handler registered via `Node::subscribe_any`: receives every message
/// published on the topic regardless of type, erased behind the generic
/// sentinel.
struct AnyHandler<F> {
    callback: F,
}

impl<F: Send + Sync> Registered for AnyHandler<F> {
    fn type_name(&self) -> &str {
        crate::types::GENERIC_MESSAGE_SENTINEL
    }
}

impl<F> Handler for AnyHandler<F>
where
    F: Fn(&dyn AnyMessage, &MessageInfo) + Send + Sync,
{
    fn run_local_callback(&self, msg: &dyn AnyMessage, info: &MessageInfo) {
        (self.callback)(msg, info);
    }
}

struct TypedReplier<Req, Resp, F> {
    type_name: &'static str,
    callback: F,
    _marker: PhantomData<fn(&Req) -> Resp>,
}

impl<Req, Resp, F> Registered for TypedReplier<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: Fn(&Req) -> Resp + Send + Sync,
{
    fn type_name(&self) -> &str {
        self.type_name
    }
}

impl<Req, Resp, F> Replier for TypedReplier<Req, Resp, F>
where
    Req: Message,
    Resp: Message,
    F: Fn(&Req) -> Resp + Send + Sync,
{
    fn invoke(&self, request: &dyn AnyMessage) -> Option<Box<dyn AnyMessage>> {
        let req = request.as_any().downcast_ref::<Req>()?;
        Some(Box::new((self.callback)(req)))
    }
}

/// The fabric's user-facing handle: advertise/subscribe/unsubscribe topics,
/// advertise/invoke services, all scoped under one partition/namespace.
pub struct Node {
    id: NodeId,
    options: NodeOptions,
    context: Arc<SharedContext>,
    advertised_topics: Mutex<HashSet<FullyQualifiedName>>,
    subscribed_topics: Mutex<HashMap<FullyQualifiedName, Vec<HandlerId>>>,
    advertised_services: Mutex<HashMap<FullyQualifiedName, Vec<HandlerId>>>,
}

impl Node {
    pub fn new(options: NodeOptions, context: Arc<SharedContext>) -> Self {
        Self {
            id: NodeId::generate(),
            options,
            context,
            advertised_topics: Mutex::new(HashSet::new()),
            subscribed_topics: Mutex::new(HashMap::new()),
            advertised_services: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn resolve(&self, name: &str) -> Result<FullyQualifiedName> {
        topic_name::fully_qualify(&self.options.partition, &self.options.namespace, name)
    }

    /// Registers with discovery and returns a `Publisher` handle. A second
    /// `advertise` for the same topic from the same node fails with
    /// `AlreadyAdvertised`.
    pub fn advertise<T: Message>(
        &self,
        topic: &str,
        options: AdvertiseOptions,
    ) -> Result<Publisher<T>> {
        let fq = self.resolve(topic)?;
        {
            let mut advertised = self.advertised_topics.lock();
            if advertised.contains(&fq) {
                return Err(NetBusError::AlreadyAdvertised(fq.to_string()));
            }
            advertised.insert(fq.clone());
        }

        let descriptor = MessagePublisher {
            topic: fq.clone(),
            type_name: T::type_name().to_string(),
            data_address: self.context.data_address().to_string(),
            process_id: self.context.process_id(),
            node_id: self.id,
            options: options.clone(),
        };
        if let Err(err) = self.context.advertise_publisher(descriptor) {
            self.advertised_topics.lock().remove(&fq);
            return Err(err);
        }

        let topic_view = topic_name::strip_partition(&fq).to_string();
        Ok(Publisher::new(
            fq,
            topic_view,
            self.id,
            self.context.process_id(),
            Arc::downgrade(&self.context),
            options.period(),
        ))
    }

    /// Registers `callback` for messages whose type name matches
    /// `T::type_name()`, installs the transport filter on first interest,
    /// and asks discovery to resolve remote publishers of `topic`.
    pub fn subscribe<T, F>(&self, topic: &str, callback: F) -> Result<()>
    where
        T: Message,
        F: Fn(&T, &MessageInfo) + Send + Sync + 'static,
    {
        let fq = self.resolve(topic)?;
        let handler_id = HandlerId::generate();
        let handler = Arc::new(TypedHandler {
            type_name: T::type_name(),
            callback,
            _marker: PhantomData,
        });
        self.context
            .register_local_handler(fq.clone(), self.id, handler_id, handler);
        self.subscribed_topics
            .lock()
            .entry(fq.clone())
            .or_default()
            .push(handler_id);
        if let Err(err) = self.context.discover(&fq) {
            log::warn!("discover failed for '{fq}': {err}");
            return Err(err);
        }
        Ok(())
    }

    /// A subscription registered under the generic sentinel: receives every
    /// message published on `topic` regardless of type.
    pub fn subscribe_any<F>(&self, topic: &str, callback: F) -> Result<()>
    where
        F: Fn(&dyn AnyMessage, &MessageInfo) + Send + Sync + 'static,
    {
        let fq = self.resolve(topic)?;
        let handler_id = HandlerId::generate();
        let handler = Arc::new(AnyHandler { callback });
        self.context
            .register_local_handler(fq.clone(), self.id, handler_id, handler);
        self.subscribed_topics
            .lock()
            .entry(fq.clone())
            .or_default()
            .push(handler_id);
        if let Err(err) = self.context.discover(&fq) {
            log::warn!("discover failed for '{fq}': {err}");
            return Err(err);
        }
        Ok(())
    }

    /// Removes every handler this node registered for `topic`, drops the
    /// transport filter if nothing is left, and sends the best-effort
    /// end-of-subscription control message to any known remote publisher.
    pub fn unsubscribe(&self, topic: &str) -> Result<()> {
        let fq = self.resolve(topic)?;
        self.subscribed_topics.lock().remove(&fq);
        if self.context.unregister_local_handlers(&fq, self.id) {
            self.context.notify_unsubscribe(&fq, self.id);
        }
        Ok(())
    }

    /// Registers a request handler for `service`. Named `advertise_service`
    /// to mirror `advertise`'s naming.
    pub fn advertise_service<Req, Resp, F>(&self, service: &str, callback: F) -> Result<()>
    where
        Req: Message,
        Resp: Message,
        F: Fn(&Req) -> Resp + Send + Sync + 'static,
    {
        let fq = self.resolve(service)?;
        self.context.advertise_service(fq.clone(), self.id)?;
        let handler_id = HandlerId::generate();
        let replier = Arc::new(TypedReplier {
            type_name: Req::type_name(),
            callback,
            _marker: PhantomData,
        });
        self.context.register_replier(fq.clone(), self.id, handler_id, replier);
        self.advertised_services
            .lock()
            .entry(fq)
            .or_default()
            .push(handler_id);
        Ok(())
    }

    pub fn unadvertise_service(&self, service: &str) -> Result<()> {
        let fq = self.resolve(service)?;
        self.advertised_services.lock().remove(&fq);
        self.context.unregister_repliers(&fq, self.id);
        self.context.unadvertise_service(&fq, self.id)
    }

    /// Invokes a service. For the in-process case this runs the matching
    /// replier's callback directly and returns its result; a remote call
    /// would go through a transport-level request, which is outside this
    /// crate's scope.
    pub async fn request<Req, Resp>(
        &self,
        service: &str,
        msg: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: Message,
        Resp: Message,
    {
        let fq = self.resolve(service)?;
        let view = topic_name::strip_partition(&fq).to_string();
        let repliers = self.context.matching_repliers(&fq, Req::type_name());
        let Some(replier) = repliers.into_iter().next() else {
            return Err(NetBusError::UnknownService(view));
        };

        let call = async move {
            match replier.invoke(msg) {
                Some(response) => downcast_response::<Resp>(response),
                None => Err(NetBusError::TypeMismatch {
                    expected: Resp::type_name().to_string(),
                    actual: Req::type_name().to_string(),
                }),
            }
        };

        match async_std::future::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(NetBusError::RequestTimedOut(view)),
        }
    }

    pub fn advertised_topics(&self) -> Vec<String> {
        self.advertised_topics
            .lock()
            .iter()
            .map(|t| topic_name::strip_partition(t).to_string())
            .collect()
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscribed_topics
            .lock()
            .keys()
            .map(|t| topic_name::strip_partition(t).to_string())
            .collect()
    }

    pub fn advertised_services(&self) -> Vec<String> {
        self.advertised_services
            .lock()
            .keys()
            .map(|t| topic_name::strip_partition(t).to_string())
            .collect()
    }

    /// Every name discovery knows about whose embedded partition matches
    /// this node's, partition-stripped.
    pub fn topic_list(&self) -> Vec<String> {
        self.context
            .topic_list()
            .iter()
            .filter(|t| t.partition() == self.options.partition)
            .map(|t| topic_name::strip_partition(t).to_string())
            .collect()
    }

    /// Same filtering as `topic_list`, over service names.
    pub fn service_list(&self) -> Vec<String> {
        self.context
            .service_list()
            .iter()
            .filter(|t| t.partition() == self.options.partition)
            .map(|t| topic_name::strip_partition(t).to_string())
            .collect()
    }

    /// Waits for discovery to finish initializing, then returns every known
    /// publisher of `topic` grouped by process, with value-duplicate
    /// entries within a process removed.
    pub fn topic_info(&self, topic: &str) -> Result<HashMap<ProcessId, Vec<MessagePublisher>>> {
        self.context.wait_for_init();
        let fq = self.resolve(topic)?;
        Ok(dedup_by_value(self.context.publishers(&fq)))
    }

    /// The service-side counterpart to `topic_info`, grouping known
    /// repliers' node UUIDs by process.
    pub fn service_info(&self, service: &str) -> Result<HashMap<ProcessId, Vec<NodeId>>> {
        self.context.wait_for_init();
        let fq = self.resolve(service)?;
        let mut out: HashMap<ProcessId, Vec<NodeId>> = HashMap::new();
        for (process, node) in self.context.service_providers(&fq) {
            let nodes = out.entry(process).or_default();
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
        Ok(out)
    }
}

/// Removes value-duplicate entries within each process's vector.
/// `MessagePublisher` carries no `Hash` impl, since its `AdvertiseOptions`
/// field holds an `Option<f64>`, so this is a linear scan rather than a
/// `HashSet`.
fn dedup_by_value(
    map: HashMap<ProcessId, Vec<MessagePublisher>>,
) -> HashMap<ProcessId, Vec<MessagePublisher>> {
    map.into_iter()
        .map(|(process, publishers)| {
            let mut deduped: Vec<MessagePublisher> = Vec::with_capacity(publishers.len());
            for publisher in publishers {
                if !deduped.contains(&publisher) {
                    deduped.push(publisher);
                }
            }
            (process, deduped)
        })
        .collect()
}

fn downcast_response<Resp: Message>(response: Box<dyn AnyMessage>) -> Result<Resp> {
    let type_name = response.type_name();
    let any: Box<dyn Any> = response.into_any();
    any.downcast::<Resp>()
        .map(|boxed| *boxed)
        .map_err(|_| NetBusError::TypeMismatch {
            expected: Resp::type_name().to_string(),
            actual: type_name.to_string(),
        })
}

impl Drop for Node {
    /// Unsubscribes from every topic this node still holds handlers for,
    /// then unadvertises every service, so no entries for a destroyed node
    /// remain anywhere in the tables.
    fn drop(&mut self) {
        let topics: Vec<FullyQualifiedName> = self.subscribed_topics.lock().keys().cloned().collect();
        for topic in topics {
            if self.context.unregister_local_handlers(&topic, self.id) {
                self.context.notify_unsubscribe(&topic, self.id);
            }
        }

        let services: Vec<FullyQualifiedName> =
            self.advertised_services.lock().keys().cloned().collect();
        for service in services {
            self.context.unregister_repliers(&service, self.id);
            if let Err(err) = self.context.unadvertise_service(&service, self.id) {
                log::warn!("unadvertise_service failed for '{service}' on drop: {err}");
            }
        }
    }
}

/// Discovery/transport failure paths, exercised against mocked
/// collaborators rather than the loopback fakes, which never fail.
#[cfg(test)]
mod discovery_failure_tests {
    use super::*;
    use crate::implementation::discovery::{MockDiscoveryClient, MockServiceDiscoveryClient};
    use crate::implementation::transport::MockTransport;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping {
        value: i32,
    }

    impl Message for Ping {
        fn type_name() -> &'static str {
            "Ping"
        }

        fn to_bytes(&self) -> std::result::Result<Vec<u8>, String> {
            Ok(self.value.to_le_bytes().to_vec())
        }
    }

    fn context_with_mocks(
        discovery: MockDiscoveryClient,
        service_discovery: MockServiceDiscoveryClient,
        transport: MockTransport,
    ) -> Arc<SharedContext> {
        SharedContext::new(
            Box::new(discovery),
            Box::new(service_discovery),
            Box::new(transport),
            "inproc://mock/data",
            "inproc://mock/control",
        )
    }

    #[test_log::test]
    fn advertise_rolls_back_local_bookkeeping_on_discovery_rejection() {
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_advertise()
            .times(1)
            .returning(|_| Err(NetBusError::DiscoveryFailed("rejected".to_string())));
        let ctx = context_with_mocks(
            discovery,
            MockServiceDiscoveryClient::new(),
            MockTransport::new(),
        );
        let node = Node::new(NodeOptions::default(), ctx);

        let err = node.advertise::<Ping>("/a", AdvertiseOptions::new()).unwrap_err();
        assert!(matches!(err, NetBusError::DiscoveryFailed(_)));
        // A rejected advertise must not leave `/a` claimed, otherwise a later
        // retry would spuriously fail with `AlreadyAdvertised`.
        assert!(node.advertised_topics().is_empty());
    }

    #[test_log::test]
    fn unadvertise_service_surfaces_discovery_failure() {
        let mut service_discovery = MockServiceDiscoveryClient::new();
        service_discovery.expect_advertise().times(1).returning(|_, _, _| Ok(()));
        service_discovery
            .expect_unadvertise()
            .times(1)
            .returning(|_, _| Err(NetBusError::DiscoveryFailed("gone".to_string())));
        let ctx = context_with_mocks(
            MockDiscoveryClient::new(),
            service_discovery,
            MockTransport::new(),
        );
        let node = Node::new(NodeOptions::default(), ctx);

        node.advertise_service::<Ping, Ping, _>("/svc", |req: &Ping| req.clone())
            .unwrap();
        let err = node.unadvertise_service("/svc").unwrap_err();
        assert!(matches!(err, NetBusError::DiscoveryFailed(_)));
        // The local bookkeeping is dropped regardless: an explicit call still
        // surfaces the error to the caller while clearing local state, so
        // `Drop` does not try to unadvertise it a second time.
        assert!(node.advertised_services().is_empty());
    }
}
