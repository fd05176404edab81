//! Compile-time node configuration
//!
//! Runtime settings (WiFi and broker credentials) live in the persisted
//! [`NetworkConfig`](crate::domain::entity::NetworkConfig). Everything here is
//! fixed per build.

use core::net::Ipv4Addr;

use embassy_time::Duration;

/// Maximum length of every persisted string field
pub const MAX_FIELD_LEN: usize = 100;

/// Broker port used when the stored one is absent or out of range
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Namespace of the key-value configuration backend
pub const CONFIG_NAMESPACE: &str = "smart-home";

/// Access point settings used while provisioning
pub struct AccessPointConfig {
    pub ssid: &'static str,
    pub password: &'static str,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

pub const ACCESS_POINT: AccessPointConfig = AccessPointConfig {
    ssid: "SmartHome-Config",
    password: "configureme",
    address: Ipv4Addr::new(192, 168, 4, 1),
    prefix_len: 24,
};

pub const DNS_PORT: u16 = 53;
pub const HTTP_PORT: u16 = 80;

/// Upper bound for joining the configured network at boot
pub const STATION_CONNECT_TIMEOUT_MS: u32 = 20_000;
pub const STATION_POLL_INTERVAL_MS: u32 = 500;

/// Delay between answering a save/reset request and restarting
pub const RESTART_DELAY_MS: u32 = 1_000;
/// Meta-refresh delay of the confirmation pages
pub const PAGE_REFRESH_SECS: u32 = 10;

pub const TOPIC_ROOT: &str = "home";
pub const DISCOVERY_PREFIX: &str = "homeassistant";
pub const COMMAND_ACTION: &str = "set";
pub const STATE_KIND: &str = "state";

/// Location subtrees subscribed in addition to the device's own one
pub const EXTRA_COMMAND_LOCATIONS: &[&str] = &["salon"];

/// Minimal spacing between two reconnect attempts of the tick-driven loop
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(10);
/// Delay between attempts of the blocking reconnect loop
pub const BLOCKING_RECONNECT_DELAY_MS: u32 = 5_000;

pub const ANNOUNCE_ATTEMPTS: usize = 3;
pub const ANNOUNCE_RETRY_DELAY_MS: u32 = 500;
pub const ANNOUNCE_SETTLE_DELAY_MS: u32 = 100;
pub const DISCOVERY_PAYLOAD_SIZE: usize = 512;

/// Size of the per-message topic and payload buffers, terminator included
pub const INBOUND_BUFFER_SIZE: usize = 128;
