//! WiFi radio and captive portal sockets
//!
//! One radio serves either the configured network (DHCP client stack) or the
//! provisioning access point (static stack with its own DHCP server).

use embassy_executor::{SpawnError, Spawner};
use embassy_net::{
    DhcpConfig,
    IpEndpoint,
    Ipv4Cidr,
    Stack,
    StackResources,
    StaticConfigV4,
    tcp::{self, TcpSocket},
    udp::{self, PacketMetadata, UdpSocket},
};
use embassy_time::with_timeout;
use esp_hal::peripherals::WIFI;
use esp_radio::wifi::{
    AccessPointConfig as RadioAccessPointConfig,
    AuthMethod,
    ClientConfig,
    Config as WifiConfig,
    ModeConfig,
    WifiController,
    WifiDevice,
    WifiError,
};
use smarthome_node::config::AccessPointConfig;
use smarthome_node::domain::ports::PortalNetwork;

use super::platform::get_seed;
use crate::config::{
    DNS_TIMEOUT,
    HOSTNAME,
    HTTP_ACCEPT_TIMEOUT,
    HTTP_SOCKET_TIMEOUT,
    MAX_CONNECTIONS,
};
use crate::infrastructure::tasks::{dhcp_server_task, network_runner_task};

const DNS_BUFFER_SIZE: usize = 1024;
const DNS_PACKET_SLOTS: usize = 4;
const HTTP_BUFFER_SIZE: usize = 2048;

#[derive(Debug)]
pub(crate) enum NetworkError {
    Init(esp_radio::InitializationError),
    Wifi(WifiError),
    Spawn(SpawnError),
    Bind(udp::BindError),
    Send(udp::SendError),
    /// The interface or stack needed by the call is not available
    NoStack,
}

pub(crate) struct EspNetwork {
    spawner: Spawner,
    controller: WifiController<'static>,
    sta: Option<WifiDevice<'static>>,
    ap: Option<WifiDevice<'static>>,
    station: Option<Stack<'static>>,
    access_point: Option<Stack<'static>>,
    dns: Option<UdpSocket<'static>>,
    http: Option<TcpSocket<'static>>,
    http_port: u16,
}

impl EspNetwork {
    pub(crate) fn new(spawner: Spawner, wifi: WIFI<'static>) -> Result<Self, NetworkError> {
        let radio = esp_radio::init().map_err(NetworkError::Init)?;
        let radio = &*mk_static!(esp_radio::Controller<'static>, radio);
        let (controller, interfaces) =
            esp_radio::wifi::new(radio, wifi, WifiConfig::default()).map_err(NetworkError::Wifi)?;

        Ok(Self {
            spawner,
            controller,
            sta: Some(interfaces.sta),
            ap: Some(interfaces.ap),
            station: None,
            access_point: None,
            dns: None,
            http: None,
            http_port: 0,
        })
    }

    /// Stack of the joined network
    pub(crate) fn station_stack(&self) -> Option<Stack<'static>> {
        self.station
    }

    async fn stop_radio(&mut self) -> Result<(), NetworkError> {
        if matches!(self.controller.is_started(), Ok(true)) {
            self.controller.stop_async().await.map_err(NetworkError::Wifi)?;
        }
        Ok(())
    }
}

impl PortalNetwork for EspNetwork {
    type Error = NetworkError;
    type Peer = IpEndpoint;
    type Connection<'a> = &'a mut TcpSocket<'static>;

    async fn join_station(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        let client = ClientConfig::default().with_ssid(ssid.into());
        let client = if password.is_empty() {
            client.with_auth_method(AuthMethod::None)
        } else {
            client.with_password(password.into())
        };

        self.stop_radio().await?;
        self.controller
            .set_config(&ModeConfig::Client(client))
            .map_err(NetworkError::Wifi)?;
        self.controller.start_async().await.map_err(NetworkError::Wifi)?;

        if self.station.is_none() {
            let device = self.sta.take().ok_or(NetworkError::NoStack)?;
            self.station = Some(station_stack(self.spawner, device)?);
        }

        log::info!("wifi: connecting to '{}'", ssid);
        self.controller.connect_async().await.map_err(NetworkError::Wifi)
    }

    fn is_station_connected(&self) -> bool {
        self.station
            .is_some_and(|stack| stack.is_link_up() && stack.config_v4().is_some())
    }

    async fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError> {
        let radio_config = RadioAccessPointConfig::default()
            .with_ssid(config.ssid.into())
            .with_password(config.password.into())
            .with_auth_method(AuthMethod::Wpa2Personal);

        self.stop_radio().await?;
        self.controller
            .set_config(&ModeConfig::AccessPoint(radio_config))
            .map_err(NetworkError::Wifi)?;
        self.controller.start_async().await.map_err(NetworkError::Wifi)?;

        if self.access_point.is_none() {
            let device = self.ap.take().ok_or(NetworkError::NoStack)?;
            let stack = access_point_stack(self.spawner, device, config)?;
            self.spawner
                .spawn(dhcp_server_task(stack, config.address))
                .map_err(NetworkError::Spawn)?;
            self.access_point = Some(stack);
        }
        log::info!("wifi: access point '{}' started", config.ssid);
        Ok(())
    }

    async fn start_captive_services(
        &mut self,
        dns_port: u16,
        http_port: u16,
    ) -> Result<(), NetworkError> {
        let stack = self.access_point.ok_or(NetworkError::NoStack)?;
        if self.dns.is_some() {
            return Ok(());
        }

        let mut dns = UdpSocket::new(
            stack,
            mk_static!([PacketMetadata; DNS_PACKET_SLOTS], [PacketMetadata::EMPTY; DNS_PACKET_SLOTS]),
            mk_static!([u8; DNS_BUFFER_SIZE], [0; DNS_BUFFER_SIZE]),
            mk_static!([PacketMetadata; DNS_PACKET_SLOTS], [PacketMetadata::EMPTY; DNS_PACKET_SLOTS]),
            mk_static!([u8; DNS_BUFFER_SIZE], [0; DNS_BUFFER_SIZE]),
        );
        dns.bind(dns_port).map_err(NetworkError::Bind)?;

        let mut http = TcpSocket::new(
            stack,
            mk_static!([u8; HTTP_BUFFER_SIZE], [0; HTTP_BUFFER_SIZE]),
            mk_static!([u8; HTTP_BUFFER_SIZE], [0; HTTP_BUFFER_SIZE]),
        );
        http.set_timeout(Some(HTTP_SOCKET_TIMEOUT));

        self.dns = Some(dns);
        self.http = Some(http);
        self.http_port = http_port;
        log::info!("portal: dns on {}, http on {}", dns_port, http_port);
        Ok(())
    }

    async fn poll_dns(&mut self, buffer: &mut [u8]) -> Option<(usize, IpEndpoint)> {
        let socket = self.dns.as_mut()?;
        match with_timeout(DNS_TIMEOUT, socket.recv_from(buffer)).await {
            Ok(Ok((len, meta))) => Some((len, meta.endpoint)),
            Ok(Err(e)) => {
                log::debug!("dns: receive failed: {:?}", e);
                None
            }
            Err(_) => None,
        }
    }

    async fn send_dns(&mut self, packet: &[u8], peer: IpEndpoint) -> Result<(), NetworkError> {
        let socket = self.dns.as_mut().ok_or(NetworkError::NoStack)?;
        socket.send_to(packet, peer).await.map_err(NetworkError::Send)
    }

    async fn poll_http(&mut self) -> Option<&mut TcpSocket<'static>> {
        let port = self.http_port;
        let socket = self.http.as_mut()?;

        // Finish the previous exchange before listening again
        if !matches!(socket.state(), tcp::State::Closed | tcp::State::Listen) {
            socket.close();
            let _ = with_timeout(HTTP_ACCEPT_TIMEOUT, socket.flush()).await;
            socket.abort();
        }

        match with_timeout(HTTP_ACCEPT_TIMEOUT, socket.accept(port)).await {
            Ok(Ok(())) => Some(socket),
            Ok(Err(e)) => {
                log::debug!("http: accept failed: {:?}", e);
                socket.abort();
                None
            }
            Err(_) => None,
        }
    }
}

fn station_stack(
    spawner: Spawner,
    device: WifiDevice<'static>,
) -> Result<Stack<'static>, NetworkError> {
    let mut dhcp_config = DhcpConfig::default();
    dhcp_config.hostname = heapless::String::try_from(HOSTNAME).ok();

    let resources = mk_static!(StackResources<MAX_CONNECTIONS>, StackResources::new());
    let (stack, runner) = embassy_net::new(
        device,
        embassy_net::Config::dhcpv4(dhcp_config),
        resources,
        get_seed(),
    );
    spawner
        .spawn(network_runner_task(runner))
        .map_err(NetworkError::Spawn)?;
    Ok(stack)
}

fn access_point_stack(
    spawner: Spawner,
    device: WifiDevice<'static>,
    config: &AccessPointConfig,
) -> Result<Stack<'static>, NetworkError> {
    let static_config = StaticConfigV4 {
        address: Ipv4Cidr::new(config.address, config.prefix_len),
        gateway: Some(config.address),
        dns_servers: heapless::Vec::default(),
    };

    let resources = mk_static!(StackResources<MAX_CONNECTIONS>, StackResources::new());
    let (stack, runner) = embassy_net::new(
        device,
        embassy_net::Config::ipv4_static(static_config),
        resources,
        get_seed(),
    );
    spawner
        .spawn(network_runner_task(runner))
        .map_err(NetworkError::Spawn)?;
    Ok(stack)
}
