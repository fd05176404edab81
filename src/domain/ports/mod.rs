pub mod command;
pub mod network;
pub mod persistence;
pub mod platform;
pub mod pubsub;

pub use command::*;
pub use network::*;
pub use persistence::*;
pub use platform::*;
pub use pubsub::*;
