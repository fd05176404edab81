#![allow(clippy::unreadable_literal)]

use embassy_time::Duration;

pub(crate) const PLATFORM_TAG: &str = "esp32";
pub(crate) const HOSTNAME: &str = "smarthome-node";

/// Flash sector holding the byte configuration region.
///
/// Last 4 KiB of a 4 MiB flash, outside the default partition table.
pub(crate) const CONFIG_SECTOR_OFFSET: u32 = 0x3F_F000;

/// Flash sector holding the key-value namespace, right below the byte region
pub(crate) const KEY_VALUE_SECTOR_OFFSET: u32 = 0x3F_E000;

/// Room for every configuration field at full length
pub(crate) const KEY_VALUE_REGION_SIZE: usize = 1024;

pub(crate) const MAX_CONNECTIONS: usize = 6;

pub(crate) const DNS_TIMEOUT: Duration = Duration::from_millis(5);
pub(crate) const HTTP_ACCEPT_TIMEOUT: Duration = Duration::from_millis(20);
pub(crate) const HTTP_SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) struct MqttConfig {
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// Wait for the session task to serve a subscribe or publish
    pub request_timeout: Duration,
}

pub(crate) const MQTT: MqttConfig = MqttConfig {
    keep_alive: Duration::from_secs(15),
    connect_timeout: Duration::from_secs(10),
    request_timeout: Duration::from_secs(5),
};

/// Pause between two ticks of the broker session loop
pub(crate) const MAIN_LOOP_INTERVAL: Duration = Duration::from_millis(10);
