//! Flash backed configuration regions
//!
//! Each region lives in RAM and is written back to its own flash sector on
//! commit, the way an EEPROM emulation does. All regions share one
//! [`FlashStorage`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use smarthome_node::domain::ports::{NvRegion, StorageError};

pub(crate) const BLOCK_SIZE: u32 = 4096;

static FLASH_STORAGE: Mutex<CriticalSectionRawMutex, RefCell<Option<FlashStorage<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Hand the flash peripheral to the regions. Must be called before mapping any.
pub(crate) fn init_flash(flash: FLASH<'static>) {
    FLASH_STORAGE.lock(|cell| {
        cell.borrow_mut().replace(FlashStorage::new(flash));
    });
}

fn with_flash<T>(
    f: impl FnOnce(&mut FlashStorage<'static>) -> Result<T, StorageError>,
) -> Result<T, StorageError> {
    FLASH_STORAGE.lock(|cell| match cell.borrow_mut().as_mut() {
        Some(flash) => f(flash),
        None => {
            log::error!("flash: storage is not initialized");
            Err(StorageError::DriverError)
        }
    })
}

pub(crate) struct FlashRegion<const N: usize> {
    offset: u32,
    mirror: [u8; N],
}

impl<const N: usize> FlashRegion<N> {
    /// Map the region at `offset`, which must be sector aligned
    pub(crate) fn new(offset: u32) -> Self {
        let mut mirror = [0xFF; N];
        let read = with_flash(|flash| {
            flash.read(offset, &mut mirror).map_err(|e| {
                log::error!("flash: failed to read sector at {:#x}: {:?}", offset, e);
                StorageError::DriverError
            })
        });
        if read.is_err() {
            mirror.fill(0xFF);
        }
        Self { offset, mirror }
    }
}

impl<const N: usize> NvRegion for FlashRegion<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read_bytes(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        let source = self
            .mirror
            .get(offset..offset + buffer.len())
            .ok_or(StorageError::OutOfBounds)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.mirror
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let (offset, mirror) = (self.offset, &self.mirror);
        with_flash(|flash| {
            flash.erase(offset, offset + BLOCK_SIZE).map_err(|e| {
                log::error!("flash: failed to erase sector at {:#x}: {:?}", offset, e);
                StorageError::DriverError
            })?;
            NorFlash::write(flash, offset, mirror).map_err(|e| {
                log::error!("flash: failed to write sector at {:#x}: {:?}", offset, e);
                StorageError::DriverError
            })
        })
    }
}
