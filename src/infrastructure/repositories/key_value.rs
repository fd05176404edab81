use crate::config::DEFAULT_MQTT_PORT;
use crate::domain::entity::{NetworkConfig, port_or_default};
use crate::domain::ports::{ConfigStore, KeyValueStore, StorageError};

const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASSWORD: &str = "wifi_pass";
const KEY_MQTT_SERVER: &str = "mqtt_server";
const KEY_MQTT_PORT: &str = "mqtt_port";
const KEY_MQTT_USER: &str = "mqtt_user";
const KEY_MQTT_PASSWORD: &str = "mqtt_pass";

/// Configuration store over a namespaced [`KeyValueStore`]
pub struct KeyValueConfigStore<K> {
    store: K,
}

impl<K: KeyValueStore> KeyValueConfigStore<K> {
    pub const fn new(store: K) -> Self {
        Self { store }
    }

    /// Release the underlying store
    pub fn into_inner(self) -> K {
        self.store
    }
}

impl<K: KeyValueStore> ConfigStore for KeyValueConfigStore<K> {
    fn load(&mut self) -> NetworkConfig {
        let port = self
            .store
            .get_i32(KEY_MQTT_PORT, i32::from(DEFAULT_MQTT_PORT));

        NetworkConfig {
            wifi_ssid: self.store.get_str(KEY_WIFI_SSID, ""),
            wifi_password: self.store.get_str(KEY_WIFI_PASSWORD, ""),
            mqtt_server: self.store.get_str(KEY_MQTT_SERVER, ""),
            mqtt_port: i32::from(port_or_default(port)),
            mqtt_user: self.store.get_str(KEY_MQTT_USER, ""),
            mqtt_password: self.store.get_str(KEY_MQTT_PASSWORD, ""),
        }
    }

    fn save(&mut self, config: &NetworkConfig) -> Result<(), StorageError> {
        self.store.put_str(KEY_WIFI_SSID, &config.wifi_ssid)?;
        self.store.put_str(KEY_WIFI_PASSWORD, &config.wifi_password)?;
        self.store.put_str(KEY_MQTT_SERVER, &config.mqtt_server)?;
        self.store.put_i32(KEY_MQTT_PORT, config.mqtt_port)?;
        self.store.put_str(KEY_MQTT_USER, &config.mqtt_user)?;
        self.store.put_str(KEY_MQTT_PASSWORD, &config.mqtt_password)
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.store.clear()
    }
}
