mod flash_region;
pub(crate) mod mqtt_client;
pub(crate) mod mqtt_transport;
mod network;
mod platform;

pub(crate) use flash_region::{FlashRegion, init_flash};
pub(crate) use mqtt_client::EspMqttClient;
pub(crate) use network::EspNetwork;
pub(crate) use platform::EspPlatform;
