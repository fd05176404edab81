use embassy_net::Runner;
use esp_radio::wifi::WifiDevice;

/// Background task running a network stack.
///
/// One instance per interface: the station and the access point.
#[embassy_executor::task(pool_size = 2)]
pub(crate) async fn network_runner_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}
