use crate::domain::entity::DeviceIdentity;

/// Board specific capabilities needed by the core
pub trait Platform {
    /// Stable hardware identifier, e.g. the MAC address in hex
    fn hardware_id(&self) -> &str;

    /// Short lower-case platform tag, e.g. `esp32`
    fn platform_tag(&self) -> &'static str;

    /// Restart the device
    fn restart(&mut self);

    /// Identity of the node derived from the platform
    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.platform_tag(), self.hardware_id())
    }
}
