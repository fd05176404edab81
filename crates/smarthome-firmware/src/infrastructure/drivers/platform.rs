use core::fmt::Write as _;

use esp_hal::rng::Rng;
use smarthome_node::domain::entity::HardwareId;
use smarthome_node::domain::ports::Platform;

use crate::config::PLATFORM_TAG;

/// ESP32 board identity and reset
pub(crate) struct EspPlatform {
    hardware_id: HardwareId,
}

impl EspPlatform {
    pub(crate) fn new() -> Self {
        let mac = esp_hal::efuse::Efuse::mac_address();
        let mut hardware_id = HardwareId::new();
        for byte in mac {
            let _ = write!(hardware_id, "{:02X}", byte);
        }
        Self { hardware_id }
    }
}

impl Platform for EspPlatform {
    fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    fn platform_tag(&self) -> &'static str {
        PLATFORM_TAG
    }

    fn restart(&mut self) {
        esp_hal::system::software_reset();
    }
}

/// Seed for the network stacks
pub(crate) fn get_seed() -> u64 {
    let rng = Rng::new();
    u64::from(rng.random()) << 32 | u64::from(rng.random())
}
