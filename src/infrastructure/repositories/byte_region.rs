//! Byte region configuration backend
//!
//! Stores [`NetworkConfig`] at fixed offsets of an EEPROM style region. Each
//! string is encoded as `[len][bytes]` without terminator, the port as two
//! big-endian bytes.
//!
//! String slots are spaced 50 bytes apart while the length byte admits up to
//! 100 bytes, so data is clipped to the space left before the next field.

use crate::config::{DEFAULT_MQTT_PORT, MAX_FIELD_LEN};
use crate::domain::entity::{FieldString, NetworkConfig, bounded};
use crate::domain::ports::{ConfigStore, NvRegion, StorageError};

/// Total footprint of the record
pub const REGION_SIZE: usize = 512;

/// Value of erased storage
const ERASED: u8 = 0xFF;

const PORT_OFFSET: usize = 150;

/// Location of a length-prefixed string
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    /// Data bytes available after the length byte
    width: usize,
}

impl Slot {
    /// Slot starting at `offset` and ending right before `next`
    const fn before(offset: usize, next: usize) -> Self {
        Self {
            offset,
            width: next - offset - 1,
        }
    }

    const fn full(offset: usize) -> Self {
        Self {
            offset,
            width: MAX_FIELD_LEN,
        }
    }
}

const SSID_SLOT: Slot = Slot::before(0, 50);
const PASSWORD_SLOT: Slot = Slot::before(50, 100);
const SERVER_SLOT: Slot = Slot::before(100, PORT_OFFSET);
const USER_SLOT: Slot = Slot::before(152, 202);
const MQTT_PASSWORD_SLOT: Slot = Slot::full(202);

/// Configuration store over a raw [`NvRegion`]
pub struct ByteRegionConfigStore<R> {
    region: R,
}

impl<R: NvRegion> ByteRegionConfigStore<R> {
    pub const fn new(region: R) -> Self {
        Self { region }
    }

    /// Release the underlying region
    pub fn into_inner(self) -> R {
        self.region
    }

    fn read_string(&mut self, slot: Slot) -> FieldString {
        let mut raw = [0u8; MAX_FIELD_LEN + 1];
        let raw = &mut raw[..=slot.width];
        match self.region.read_bytes(slot.offset, raw) {
            Ok(()) => decode_string(raw),
            Err(e) => {
                log::warn!("config: failed to read slot at {}: {}", slot.offset, e);
                FieldString::new()
            }
        }
    }

    fn write_string(&mut self, slot: Slot, value: &str) -> Result<(), StorageError> {
        let mut raw = [0u8; MAX_FIELD_LEN + 1];
        let len = encode_string(value, slot.width, &mut raw);
        self.region.write_bytes(slot.offset, &raw[..len])
    }

    fn read_port(&mut self) -> i32 {
        let mut raw = [ERASED; 2];
        if let Err(e) = self.region.read_bytes(PORT_OFFSET, &mut raw) {
            log::warn!("config: failed to read port: {}", e);
            return i32::from(DEFAULT_MQTT_PORT);
        }
        decode_port(raw)
    }
}

impl<R: NvRegion> ConfigStore for ByteRegionConfigStore<R> {
    fn load(&mut self) -> NetworkConfig {
        NetworkConfig {
            wifi_ssid: self.read_string(SSID_SLOT),
            wifi_password: self.read_string(PASSWORD_SLOT),
            mqtt_server: self.read_string(SERVER_SLOT),
            mqtt_port: self.read_port(),
            mqtt_user: self.read_string(USER_SLOT),
            mqtt_password: self.read_string(MQTT_PASSWORD_SLOT),
        }
    }

    fn save(&mut self, config: &NetworkConfig) -> Result<(), StorageError> {
        self.write_string(SSID_SLOT, &config.wifi_ssid)?;
        self.write_string(PASSWORD_SLOT, &config.wifi_password)?;
        self.write_string(SERVER_SLOT, &config.mqtt_server)?;
        self.region
            .write_bytes(PORT_OFFSET, &encode_port(config.mqtt_port))?;
        self.write_string(USER_SLOT, &config.mqtt_user)?;
        self.write_string(MQTT_PASSWORD_SLOT, &config.mqtt_password)?;
        self.region.commit()
    }

    /// Erase the whole region, including bytes past the record
    fn reset(&mut self) -> Result<(), StorageError> {
        let erased = [ERASED; 64];
        let capacity = self.region.capacity();
        let mut offset = 0;
        while offset < capacity {
            let len = erased.len().min(capacity - offset);
            self.region.write_bytes(offset, &erased[..len])?;
            offset += len;
        }
        self.region.commit()
    }
}

/// Decode a `[len][bytes]` slot.
///
/// A length outside `1..=100` is treated as absent. Decoding stops at an
/// erased or zero byte, and at the end of `raw`.
fn decode_string(raw: &[u8]) -> FieldString {
    let Some((&len, data)) = raw.split_first() else {
        return FieldString::new();
    };
    let len = usize::from(len);
    if len == 0 || len > MAX_FIELD_LEN {
        return FieldString::new();
    }
    let data = &data[..len.min(data.len())];
    let end = data
        .iter()
        .position(|&b| b == ERASED || b == 0)
        .unwrap_or(data.len());
    let data = &data[..end];

    let text = match core::str::from_utf8(data) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&data[..e.valid_up_to()]).unwrap_or_default(),
    };
    bounded(text)
}

/// Encode `value` into `out`, clipping the data to `width` bytes.
///
/// The length byte keeps the unclipped length (capped at 100). Returns the
/// number of bytes to write.
#[allow(clippy::cast_possible_truncation)]
fn encode_string(value: &str, width: usize, out: &mut [u8]) -> usize {
    let bytes = value.as_bytes();
    let len = bytes.len().min(MAX_FIELD_LEN);
    out[0] = len as u8;
    let stored = len.min(width).min(out.len() - 1);
    out[1..=stored].copy_from_slice(&bytes[..stored]);
    stored + 1
}

/// Ports outside of `1..=65535` are written as zero so they load as the default
fn encode_port(port: i32) -> [u8; 2] {
    match u16::try_from(port) {
        Ok(port) => port.to_be_bytes(),
        Err(_) => [0, 0],
    }
}

fn decode_port(raw: [u8; 2]) -> i32 {
    match u16::from_be_bytes(raw) {
        0 | 0xFFFF => i32::from(DEFAULT_MQTT_PORT),
        port => i32::from(port),
    }
}
