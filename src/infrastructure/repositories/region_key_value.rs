//! Key-value namespace over a byte region
//!
//! Layout: a two byte namespace marker, then entries packed back to back as
//! `[key_len][key][value_len][value]`. A key length of zero or an erased
//! byte ends the list. Integers are stored as four little-endian bytes.

use heapless::String;

use crate::config::MAX_FIELD_LEN;
use crate::domain::entity::bounded;
use crate::domain::ports::{KeyValueStore, NvRegion, StorageError};

const NAMESPACE_MARKER: u16 = 0x4B56;
const HEADER_SIZE: usize = NAMESPACE_MARKER.to_le_bytes().len();

const ERASED: u8 = 0xFF;
const MAX_KEY_LEN: usize = 15;
const MOVE_CHUNK_SIZE: usize = 64;

/// Position of one entry in the region
#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: usize,
    key_len: usize,
    value_len: usize,
}

impl Entry {
    const fn value_offset(&self) -> usize {
        self.offset + 1 + self.key_len + 1
    }

    const fn end(&self) -> usize {
        self.value_offset() + self.value_len
    }

    const fn size(&self) -> usize {
        self.end() - self.offset
    }
}

/// [`KeyValueStore`] kept in a raw [`NvRegion`].
///
/// Every put commits the region.
pub struct RegionKeyValueStore<R> {
    region: R,
}

impl<R: NvRegion> RegionKeyValueStore<R> {
    pub const fn new(region: R) -> Self {
        Self { region }
    }

    fn has_namespace(&mut self) -> bool {
        let mut marker = [0u8; HEADER_SIZE];
        self.region.read_bytes(0, &mut marker).is_ok()
            && marker == NAMESPACE_MARKER.to_le_bytes()
    }

    fn read_byte(&mut self, offset: usize) -> Option<u8> {
        let mut byte = [0u8; 1];
        self.region.read_bytes(offset, &mut byte).ok()?;
        Some(byte[0])
    }

    /// Decode the entry at `offset`, `None` at the end of the list
    fn entry_at(&mut self, offset: usize, key: &mut String<MAX_KEY_LEN>) -> Option<Entry> {
        let key_len = usize::from(self.read_byte(offset)?);
        if key_len == 0 || key_len > MAX_KEY_LEN {
            return None;
        }
        let mut raw_key = [0u8; MAX_KEY_LEN];
        self.region
            .read_bytes(offset + 1, &mut raw_key[..key_len])
            .ok()?;
        let value_len = self.read_byte(offset + 1 + key_len)?;
        if value_len == ERASED {
            return None;
        }

        let entry = Entry {
            offset,
            key_len,
            value_len: usize::from(value_len),
        };
        if entry.end() > self.region.capacity() {
            return None;
        }
        key.clear();
        key.push_str(core::str::from_utf8(&raw_key[..key_len]).ok()?)
            .ok()?;
        Some(entry)
    }

    /// Find `key`, also returning the end of the entry list
    fn find(&mut self, key: &str) -> (Option<Entry>, usize) {
        if !self.has_namespace() {
            return (None, HEADER_SIZE);
        }
        let mut found = None;
        let mut name = String::new();
        let mut offset = HEADER_SIZE;
        while let Some(entry) = self.entry_at(offset, &mut name) {
            if found.is_none() && name == key {
                found = Some(entry);
            }
            offset = entry.end();
        }
        (found, offset)
    }

    /// Read the value of `key` into `out`
    fn get<'b>(&mut self, key: &str, out: &'b mut [u8]) -> Option<&'b [u8]> {
        let entry = self.find(key).0?;
        let value = out.get_mut(..entry.value_len)?;
        if let Err(e) = self.region.read_bytes(entry.value_offset(), value) {
            log::warn!("config: failed to read '{}': {}", key, e);
            return None;
        }
        Some(value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if key.is_empty() || key.len() > MAX_KEY_LEN || value.len() > MAX_FIELD_LEN {
            return Err(StorageError::OutOfBounds);
        }
        if !self.has_namespace() {
            self.region
                .write_bytes(0, &NAMESPACE_MARKER.to_le_bytes())?;
            self.region.write_bytes(HEADER_SIZE, &[ERASED])?;
        }

        let (existing, mut end) = self.find(key);
        let new_size = 2 + key.len() + value.len();
        let freed = existing.map_or(0, |entry| entry.size());
        if end - freed + new_size > self.region.capacity() {
            return Err(StorageError::OutOfBounds);
        }

        if let Some(entry) = existing {
            self.move_bytes(entry.end(), entry.offset, end - entry.end())?;
            end -= entry.size();
        }

        self.region.write_bytes(end, &[key.len() as u8])?;
        self.region.write_bytes(end + 1, key.as_bytes())?;
        self.region
            .write_bytes(end + 1 + key.len(), &[value.len() as u8])?;
        self.region.write_bytes(end + 2 + key.len(), value)?;
        end += new_size;
        if end < self.region.capacity() {
            self.region.write_bytes(end, &[ERASED])?;
        }
        self.region.commit()
    }

    /// Move `len` bytes from `from` down to `to`
    fn move_bytes(&mut self, from: usize, to: usize, len: usize) -> Result<(), StorageError> {
        let mut chunk = [0u8; MOVE_CHUNK_SIZE];
        let mut moved = 0;
        while moved < len {
            let n = MOVE_CHUNK_SIZE.min(len - moved);
            self.region.read_bytes(from + moved, &mut chunk[..n])?;
            self.region.write_bytes(to + moved, &chunk[..n])?;
            moved += n;
        }
        Ok(())
    }
}

impl<R: NvRegion> KeyValueStore for RegionKeyValueStore<R> {
    fn get_str<const N: usize>(&mut self, key: &str, default: &str) -> String<N> {
        let mut raw = [0u8; MAX_FIELD_LEN];
        match self.get(key, &mut raw).map(core::str::from_utf8) {
            Some(Ok(value)) => bounded(value),
            _ => bounded(default),
        }
    }

    fn get_i32(&mut self, key: &str, default: i32) -> i32 {
        let mut raw = [0u8; MAX_FIELD_LEN];
        match self.get(key, &mut raw).map(<[u8; 4]>::try_from) {
            Some(Ok(bytes)) => i32::from_le_bytes(bytes),
            _ => default,
        }
    }

    fn put_str(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put(key, value.as_bytes())
    }

    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        self.put(key, &value.to_le_bytes())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let erased = [ERASED; MOVE_CHUNK_SIZE];
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
