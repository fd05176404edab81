//! Application layer: topic addressing, discovery and command dispatch

pub mod device;
pub mod discovery;
pub mod topics;

pub use device::{MqttDevice, dispatch_message};
pub use discovery::DiscoveryAnnouncer;
pub use topics::{TopicManager, TopicString};
