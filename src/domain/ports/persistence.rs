use core::fmt;

use heapless::String;

use crate::domain::entity::NetworkConfig;

/// Error type for the configuration storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying driver rejected the operation
    DriverError,
    /// Access outside of the backing region
    OutOfBounds,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DriverError => f.write_str("storage driver error"),
            StorageError::OutOfBounds => f.write_str("access out of storage bounds"),
        }
    }
}

/// Byte addressable non-volatile region (EEPROM style).
///
/// Writes may be buffered until [`NvRegion::commit`] is called.
pub trait NvRegion {
    /// Size of the region in bytes
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `offset`
    fn read_bytes(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`
    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Persist pending writes
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Namespaced key-value storage (NVS / preferences style).
///
/// Reads never fail: a missing or unreadable entry yields the supplied default.
pub trait KeyValueStore {
    /// Read a string entry
    fn get_str<const N: usize>(&mut self, key: &str, default: &str) -> String<N>;

    /// Read an integer entry
    fn get_i32(&mut self, key: &str, default: i32) -> i32;

    fn put_str(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError>;

    /// Remove every entry of the namespace
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Persistence of the node's [`NetworkConfig`]
pub trait ConfigStore {
    /// Load the configuration.
    ///
    /// Never fails: missing or corrupt fields fall back to their defaults.
    fn load(&mut self) -> NetworkConfig;

    /// Persist the configuration and commit it before returning
    fn save(&mut self, config: &NetworkConfig) -> Result<(), StorageError>;

    /// Erase the stored configuration
    fn reset(&mut self) -> Result<(), StorageError>;
}
