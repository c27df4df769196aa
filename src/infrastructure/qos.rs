//! Options/QoS structs carried across the `Advertise`/`Subscribe`/`Node::new`
//! boundary. `Default`-constructible, mutated with plain field assignment
//! or builder setters, and cheap to clone into a discovery advertise
//! descriptor.

use serde::{Deserialize, Serialize};

/// Options attached to a single `Advertise` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertiseOptions {
    /// Throttle rate in messages per second. `None`/`Some(0.0)` disables
    /// throttling.
    pub msgs_per_sec: Option<f64>,
}

impl AdvertiseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_msgs_per_sec(mut self, rate: f64) -> Self {
        self.msgs_per_sec = Some(rate);
        self
    }

    /// `period = 1s / msgsPerSec`, `None` when throttling is not
    /// configured.
    pub(crate) fn period(&self) -> Option<std::time::Duration> {
        match self.msgs_per_sec {
            Some(rate) if rate > 0.0 => Some(std::time::Duration::from_secs_f64(1.0 / rate)),
            _ => None,
        }
    }
}

/// Options attached to a single `Subscribe` call. Currently contract-only;
/// reserved for parity with `AdvertiseOptions` and future queue-depth /
/// reliability knobs a transport might want.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeOptions {}

/// Options a `Node` is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOptions {
    pub partition: String,
    pub namespace: String,
    pub verbosity: u8,
}

impl NodeOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            partition: "default".to_string(),
            namespace: namespace.into(),
            verbosity: 0,
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_is_none_when_unset() {
        assert_eq!(AdvertiseOptions::new().period(), None);
    }

    #[test]
    fn period_is_none_when_zero() {
        let opts = AdvertiseOptions::new().with_msgs_per_sec(0.0);
        assert_eq!(opts.period(), None);
    }

    #[test]
    fn period_matches_rate() {
        let opts = AdvertiseOptions::new().with_msgs_per_sec(2.0);
        assert_eq!(opts.period(), Some(std::time::Duration::from_millis(500)));
    }
}
