use core::fmt::Write as _;

use heapless::String;

use crate::config::{DEFAULT_MQTT_PORT, MAX_FIELD_LEN};

/// Bounded string used by every persisted configuration field
pub type FieldString = String<MAX_FIELD_LEN>;

/// Hardware identifier string, e.g. the hex encoded MAC address
pub type HardwareId = String<32>;

/// Broker login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Network and broker configuration of the node.
///
/// `mqtt_port` is kept signed and unchecked so a submitted value can be stored
/// as is; stores correct it when loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: FieldString,
    pub wifi_password: FieldString,
    pub mqtt_server: FieldString,
    pub mqtt_port: i32,
    pub mqtt_user: FieldString,
    pub mqtt_password: FieldString,
}

impl NetworkConfig {
    /// Create a configuration with default values
    pub const fn new() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mqtt_server: String::new(),
            mqtt_port: DEFAULT_MQTT_PORT as i32,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
        }
    }

    /// Returns true when station credentials are present
    pub fn has_station_credentials(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }

    /// Effective broker port
    pub fn broker_port(&self) -> u16 {
        port_or_default(self.mqtt_port)
    }

    /// Broker login, if a user name is configured
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if self.mqtt_user.is_empty() {
            return None;
        }
        Some(Credentials {
            username: self.mqtt_user.as_str(),
            password: self.mqtt_password.as_str(),
        })
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a stored port to the effective one.
///
/// Anything outside `1..=65535` yields [`DEFAULT_MQTT_PORT`].
pub fn port_or_default(port: i32) -> u16 {
    match u16::try_from(port) {
        Ok(0) | Err(_) => DEFAULT_MQTT_PORT,
        Ok(port) => port,
    }
}

/// Copy `value` into a bounded string, cutting at the last char boundary that fits.
pub fn bounded<const N: usize>(value: &str) -> String<N> {
    let mut end = value.len().min(N);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::new();
    // Cannot fail, `end <= N`
    let _ = out.push_str(&value[..end]);
    out
}

/// Stable identity of the node on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    platform_tag: &'static str,
    hardware_id: HardwareId,
}

impl DeviceIdentity {
    pub fn new(platform_tag: &'static str, hardware_id: &str) -> Self {
        Self {
            platform_tag,
            hardware_id: bounded(hardware_id),
        }
    }

    pub fn platform_tag(&self) -> &'static str {
        self.platform_tag
    }

    pub fn hardware_id(&self) -> &str {
        self.hardware_id.as_str()
    }

    /// Device segment of every topic: `<tag>-<hwid>`
    pub fn device_id(&self) -> String<64> {
        let mut id = String::new();
        let _ = write!(id, "{}-{}", self.platform_tag, self.hardware_id);
        id
    }

    /// Broker client identifier: `<TAG>Client-<hwid>`
    pub fn client_id(&self) -> String<64> {
        let mut id = String::new();
        for c in self.platform_tag.chars() {
            let _ = id.push(c.to_ascii_uppercase());
        }
        let _ = write!(id, "Client-{}", self.hardware_id);
        id
    }

    /// Discovery unique id of an entity: `<tag>_<hwid>_<entity>`.
    ///
    /// `None` if the id does not fit.
    pub fn unique_id(&self, entity: &str) -> Option<String<128>> {
        let mut id = String::new();
        write!(id, "{}_{}_{}", self.platform_tag, self.hardware_id, entity).ok()?;
        Some(id)
    }
}
