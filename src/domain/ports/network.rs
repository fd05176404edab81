use core::fmt::Debug;

use embedded_io_async::{Read, Write};

use crate::config::AccessPointConfig;

/// WiFi radio and local services used by the provisioning portal
#[allow(async_fn_in_trait)]
pub trait PortalNetwork {
    type Error: Debug;
    /// Address of a DNS client
    type Peer: Copy;
    /// Accepted HTTP client stream
    type Connection<'a>: Read + Write
    where
        Self: 'a;

    /// Start joining a network in station mode.
    ///
    /// Completion is observed through [`PortalNetwork::is_station_connected`].
    async fn join_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Returns true once the station link is up and addressed
    fn is_station_connected(&self) -> bool;

    /// Host a local access point with a static address
    async fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), Self::Error>;

    /// Bind the DNS and HTTP listeners of the captive portal
    async fn start_captive_services(
        &mut self,
        dns_port: u16,
        http_port: u16,
    ) -> Result<(), Self::Error>;

    /// Receive one pending DNS query, if any, without waiting for one
    async fn poll_dns(&mut self, buffer: &mut [u8]) -> Option<(usize, Self::Peer)>;

    async fn send_dns(&mut self, packet: &[u8], peer: Self::Peer) -> Result<(), Self::Error>;

    /// Accept one pending HTTP client, if any, without waiting for one
    async fn poll_http(&mut self) -> Option<Self::Connection<'_>>;
}
