//! Infrastructure layer - ESP32 implementations of the node ports

pub(crate) mod drivers;
pub(crate) mod tasks;
