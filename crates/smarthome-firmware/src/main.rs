#![no_std]
#![no_main]

// static_cell::make_static! in main causes a compiler error
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

mod config;
mod infrastructure;

use embassy_executor::Spawner;
use embassy_time::{Delay, Instant, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
use smarthome_node::app::MqttDevice;
use smarthome_node::config::ACCESS_POINT;
use smarthome_node::controllers::portal::ProvisioningPortal;
use smarthome_node::domain::ports::Platform;
use smarthome_node::infrastructure::repositories::{ConfigBackend, REGION_SIZE, RegionKeyValueStore};

use crate::config::{
    CONFIG_SECTOR_OFFSET,
    KEY_VALUE_REGION_SIZE,
    KEY_VALUE_SECTOR_OFFSET,
    MAIN_LOOP_INTERVAL,
};
use crate::infrastructure::drivers::{
    EspMqttClient,
    EspNetwork,
    EspPlatform,
    FlashRegion,
    init_flash,
};

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // The radio needs heap memory
    esp_alloc::heap_allocator!(
        #[unsafe(link_section = ".dram2_uninit")] size: 64 * 1024
    );

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    init_flash(peripherals.FLASH);
    let key_value = RegionKeyValueStore::new(FlashRegion::<KEY_VALUE_REGION_SIZE>::new(
        KEY_VALUE_SECTOR_OFFSET,
    ));
    let region = FlashRegion::<REGION_SIZE>::new(CONFIG_SECTOR_OFFSET);
    let store = ConfigBackend::detect(Some(key_value), region);
    let platform = EspPlatform::new();
    let identity = platform.identity();
    log::info!("main: node {}", identity.device_id());

    let mut network = match EspNetwork::new(spawner, peripherals.WIFI) {
        Ok(network) => network,
        Err(e) => panic!("main: failed to initialize radio: {:?}", e),
    };

    let mut portal = ProvisioningPortal::new(store, platform, Delay);
    if !portal.begin(&mut network).await {
        log::info!("main: waiting for configuration on http://{}/", ACCESS_POINT.address);
        loop {
            portal.handle_client(&mut network).await;
            Timer::after(MAIN_LOOP_INTERVAL).await;
        }
    }

    let Some(stack) = network.station_stack() else {
        panic!("main: joined without a station stack");
    };
    let client_id = &*mk_static!(heapless::String<64>, identity.client_id());
    let client = match EspMqttClient::new(spawner, stack, client_id) {
        Ok(client) => client,
        Err(e) => panic!("main: failed to start the broker session: {:?}", e),
    };
    let node_config = portal.config();
    let mut device = MqttDevice::new(client, identity, Delay, log_command);
    device
        .begin(
            &node_config.mqtt_server,
            node_config.broker_port(),
            node_config.credentials(),
        )
        .await;

    if !device.discovery().switch_config("salon", "lamp", "Lamp").await {
        log::warn!("main: discovery announcement failed");
    }

    loop {
        device.handle(Instant::now()).await;
        Timer::after(MAIN_LOOP_INTERVAL).await;
    }
}

fn log_command(location: &str, device: &str, value: &str) {
    log::info!("main: command {}/{} = {}", location, device, value);
}
