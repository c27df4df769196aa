//! Publisher handle.
//!
//! Holds a weak back-reference to the owning context plus its own
//! mutex-guarded throttle state. The publish state machine is precheck,
//! throttle gate, subscriber lookup, deep copy, then worker-pool dispatch.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::implementation::context::SharedContext;
use crate::implementation::handler_registry::MessageInfo;
use crate::message::Message;
use crate::types::{FullyQualifiedName, NodeId, ProcessId};

struct ThrottleState {
    period: Option<Duration>,
    last_emit_at: Option<Instant>,
}

impl ThrottleState {
    /// Returns true if this call should be dropped. Compares against the
    /// last *emitted* time, not the last scheduled one, using a monotonic
    /// clock source.
    fn check(&mut self) -> bool {
        let Some(period) = self.period else {
            return false;
        };
        let now = Instant::now();
        if let Some(last) = self.last_emit_at {
            if now.duration_since(last) < period {
                return true;
            }
        }
        self.last_emit_at = Some(now);
        false
    }
}

struct PublisherInner<T: Message> {
    topic: FullyQualifiedName,
    topic_view: String,
    node_id: NodeId,
    process_id: ProcessId,
    context: Weak<SharedContext>,
    throttle: Mutex<ThrottleState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Message> Drop for PublisherInner<T> {
    fn drop(&mut self) {
        // An invalid handle (see `Publisher::invalid`) never advertised
        // anything and has nothing to unwind.
        if self.topic.as_str().is_empty() {
            return;
        }
        if let Some(ctx) = self.context.upgrade() {
            if let Err(err) = ctx.unadvertise(&self.topic, self.node_id) {
                log::warn!("unadvertise failed for '{}': {err}", self.topic);
            }
        }
    }
}

/// A handle returned by `Node::advertise`. Cloning it shares the same
/// underlying advertisement; discovery only sees an unadvertise once the
/// last clone is dropped, which `Arc` refcounting gives for free.
pub struct Publisher<T: Message> {
    inner: Arc<PublisherInner<T>>,
}

impl<T: Message> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Message> Publisher<T> {
    pub(crate) fn new(
        topic: FullyQualifiedName,
        topic_view: String,
        node_id: NodeId,
        process_id: ProcessId,
        context: Weak<SharedContext>,
        throttle_period: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                topic,
                topic_view,
                node_id,
                process_id,
                context,
                throttle: Mutex::new(ThrottleState {
                    period: throttle_period,
                    last_emit_at: None,
                }),
                _marker: PhantomData,
            }),
        }
    }

    /// A handle returned wherever a failed advertise must still produce a
    /// `Publisher` value: the failure surfaces through `valid()`/
    /// `has_connections()` rather than a panic. Carries no topic and is
    /// never registered with discovery, so dropping it is a no-op.
    pub(crate) fn invalid() -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                topic: FullyQualifiedName::from_raw(String::new()),
                topic_view: String::new(),
                node_id: NodeId::generate(),
                process_id: ProcessId::generate(),
                context: Weak::new(),
                throttle: Mutex::new(ThrottleState {
                    period: None,
                    last_emit_at: None,
                }),
                _marker: PhantomData,
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic_view
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.node_id
    }

    pub fn process_id(&self) -> ProcessId {
        self.inner.process_id
    }

    /// Whether the handle still refers to a live advertisement.
    pub fn valid(&self) -> bool {
        !self.inner.topic.as_str().is_empty() && self.inner.context.upgrade().is_some()
    }

    /// Whether at least one local or remote subscriber is currently
    /// interested in this publisher's topic and type.
    pub fn has_connections(&self) -> bool {
        let Some(ctx) = self.inner.context.upgrade() else {
            return false;
        };
        ctx.has_local_subscriber(&self.inner.topic, T::type_name())
            || ctx.has_remote_subscriber(&self.inner.topic, T::type_name())
    }

    /// Fire-and-forget publish. Returns `false` only for precheck failures
    /// (invalid handle, type mismatch); throttle drops and "no subscribers"
    /// both return `true` as successful no-ops.
    pub fn publish(&self, msg: &T) -> bool {
        if !self.valid() {
            return false;
        }
        if self.inner.throttle.lock().check() {
            return true;
        }

        let Some(ctx) = self.inner.context.upgrade() else {
            return false;
        };

        let matching = ctx.matching_local_handlers(&self.inner.topic, T::type_name());
        let has_local = !matching.is_empty();
        let has_remote = ctx.has_remote_subscriber(&self.inner.topic, T::type_name());
        if !has_local && !has_remote {
            return true;
        }

        let msg_copy = msg.clone();
        let topic = self.inner.topic.clone();
        let topic_view = self.inner.topic_view.clone();
        let pool = ctx.worker_pool();

        pool.spawn(async move {
            dispatch(&ctx, &topic, &topic_view, &msg_copy, matching, has_local, has_remote);
        });
        true
    }

    /// Ownership-transfer publish. `msg` is moved into the dispatch task
    /// rather than deep-copied, and handed back to `callback` once both
    /// legs have run. The local leg's result never surfaces in the
    /// boolean; only the remote leg's actual outcome does, defaulting to
    /// `true` when there is no remote leg to run.
    pub fn publish_with_callback<F>(&self, msg: T, callback: F)
    where
        F: FnOnce(T, bool) + Send + 'static,
    {
        if !self.valid() {
            callback(msg, false);
            return;
        }
        if self.inner.throttle.lock().check() {
            callback(msg, true);
            return;
        }

        let Some(ctx) = self.inner.context.upgrade() else {
            callback(msg, false);
            return;
        };

        let matching = ctx.matching_local_handlers(&self.inner.topic, T::type_name());
        let has_local = !matching.is_empty();
        let has_remote = ctx.has_remote_subscriber(&self.inner.topic, T::type_name());
        if !has_local && !has_remote {
            callback(msg, true);
            return;
        }

        let topic = self.inner.topic.clone();
        let topic_view = self.inner.topic_view.clone();
        let pool = ctx.worker_pool();

        pool.spawn(async move {
            let remote_ok = if has_local || has_remote {
                dispatch(&ctx, &topic, &topic_view, &msg, matching, has_local, has_remote)
            } else {
                true
            };
            callback(msg, remote_ok);
        });
    }
}

/// Runs the local fan-out and, if required, the remote send, returning the
/// remote leg's result (`true` when there was no remote leg to run).
fn dispatch<T: Message>(
    ctx: &Arc<SharedContext>,
    topic: &FullyQualifiedName,
    topic_view: &str,
    msg: &T,
    matching: Vec<Arc<dyn crate::implementation::handler_registry::Handler>>,
    has_local: bool,
    has_remote: bool,
) -> bool {
    if has_local {
        let info = MessageInfo {
            topic: topic_view.to_string(),
        };
        for handler in &matching {
            handler.run_local_callback(msg, &info);
        }
    }
    if !has_remote {
        return true;
    }
    match msg.to_bytes() {
        Ok(bytes) => match ctx.publish_remote(topic, &bytes, T::type_name()) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("remote publish failed for '{topic}': {err}");
                false
            }
        },
        Err(err) => {
            log::warn!("serialization failed publishing to '{topic}': {err}");
            false
        }
    }
}
