use crate::domain::entity::NetworkConfig;
use crate::domain::ports::{ConfigStore, KeyValueStore, NvRegion, StorageError};

use super::{ByteRegionConfigStore, KeyValueConfigStore};

/// Configuration store chosen at startup from the available storage
pub enum ConfigBackend<K, R> {
    KeyValue(KeyValueConfigStore<K>),
    ByteRegion(ByteRegionConfigStore<R>),
}

impl<K: KeyValueStore, R: NvRegion> ConfigBackend<K, R> {
    /// Prefer the key-value store when the platform provides one
    pub fn detect(key_value: Option<K>, region: R) -> Self {
        match key_value {
            Some(store) => {
                log::info!("config: using key-value backend");
                ConfigBackend::KeyValue(KeyValueConfigStore::new(store))
            }
            None => {
                log::info!("config: using byte region backend");
                ConfigBackend::ByteRegion(ByteRegionConfigStore::new(region))
            }
        }
    }

    pub fn is_key_value(&self) -> bool {
        matches!(self, ConfigBackend::KeyValue(_))
    }
}

impl<K: KeyValueStore, R: NvRegion> ConfigStore for ConfigBackend<K, R> {
    fn load(&mut self) -> NetworkConfig {
        let config = match self {
            ConfigBackend::KeyValue(store) => store.load(),
            ConfigBackend::ByteRegion(store) => store.load(),
        };
        log::info!(
            "config: loaded (ssid '{}', broker '{}:{}')",
            config.wifi_ssid,
            config.mqtt_server,
            config.mqtt_port
        );
        config
    }

    fn save(&mut self, config: &NetworkConfig) -> Result<(), StorageError> {
        match self {
            ConfigBackend::KeyValue(store) => store.save(config),
            ConfigBackend::ByteRegion(store) => store.save(config),
        }
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        match self {
            ConfigBackend::KeyValue(store) => store.reset(),
            ConfigBackend::ByteRegion(store) => store.reset(),
        }
    }
}
