pub mod qos;

pub use qos::{AdvertiseOptions, NodeOptions, SubscribeOptions};
