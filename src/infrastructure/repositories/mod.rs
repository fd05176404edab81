mod backend;
mod byte_region;
mod key_value;
mod region_key_value;

pub use backend::ConfigBackend;
pub use byte_region::{ByteRegionConfigStore, REGION_SIZE};
pub use key_value::KeyValueConfigStore;
pub use region_key_value::RegionKeyValueStore;
