//! Captive provisioning portal
//!
//! At boot the node tries to join the configured network. If that fails it
//! hosts an access point with a catch-all DNS and a small configuration site.

mod pages;

use embedded_hal_async::delay::DelayNs;

use crate::{
    config::{
        ACCESS_POINT,
        DNS_PORT,
        HTTP_PORT,
        MAX_FIELD_LEN,
        RESTART_DELAY_MS,
        STATION_CONNECT_TIMEOUT_MS,
        STATION_POLL_INTERVAL_MS,
    },
    core::net::{
        dns,
        http::{self, HttpConnection, HttpMethod, HttpResult, ResponseHeaders, parse_int_lenient},
    },
    domain::{
        entity::{FieldString, NetworkConfig},
        ports::{ConfigStore, Platform, PortalNetwork, StorageError},
    },
};

pub use pages::{render_form, render_notice};

const DNS_PACKET_SIZE: usize = 512;
const PORT_FIELD_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalMode {
    /// `begin` has not run yet
    Idle,
    /// Joined the configured network
    Station,
    /// Hosting the provisioning access point
    AccessPoint,
}

pub struct ProvisioningPortal<S, P, D> {
    store: S,
    platform: P,
    delay: D,
    config: NetworkConfig,
    mode: PortalMode,
}

impl<S, P, D> ProvisioningPortal<S, P, D>
where
    S: ConfigStore,
    P: Platform,
    D: DelayNs,
{
    pub fn new(store: S, platform: P, delay: D) -> Self {
        Self {
            store,
            platform,
            delay,
            config: NetworkConfig::new(),
            mode: PortalMode::Idle,
        }
    }

    /// Load the configuration and bring the network up.
    ///
    /// Returns true when the configured network was joined. Otherwise the
    /// access point and its captive services are started and false is
    /// returned.
    pub async fn begin<N: PortalNetwork>(&mut self, net: &mut N) -> bool {
        self.config = self.store.load();

        if self.config.has_station_credentials() && self.join_station(net).await {
            log::info!("portal: joined '{}'", self.config.wifi_ssid);
            self.mode = PortalMode::Station;
            return true;
        }

        self.start_access_point(net).await;
        self.mode = PortalMode::AccessPoint;
        false
    }

    /// Serve at most one DNS query and one HTTP request.
    ///
    /// Does nothing outside access point mode.
    pub async fn handle_client<N: PortalNetwork>(&mut self, net: &mut N) {
        if self.mode != PortalMode::AccessPoint {
            return;
        }

        self.handle_dns(net).await;

        if let Some(stream) = net.poll_http().await {
            match HttpConnection::from_stream(stream).await {
                Ok(mut conn) => {
                    if let Err(e) = self.handle_request(&mut conn).await {
                        log::warn!("portal: request failed: {}", e);
                    }
                }
                Err(e) => log::debug!("portal: dropped connection: {}", e),
            }
        }
    }

    /// Erase the stored configuration and fall back to the defaults in memory.
    ///
    /// On error the in-memory configuration is left as it was.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.store.reset()?;
        self.config = NetworkConfig::new();
        log::info!("portal: configuration reset");
        Ok(())
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn mode(&self) -> PortalMode {
        self.mode
    }

    /// Returns true once the node runs on the configured network
    pub fn is_configured(&self) -> bool {
        self.mode == PortalMode::Station
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    async fn join_station<N: PortalNetwork>(&mut self, net: &mut N) -> bool {
        log::info!("portal: joining '{}'", self.config.wifi_ssid);
        if let Err(e) = net
            .join_station(&self.config.wifi_ssid, &self.config.wifi_password)
            .await
        {
            log::warn!("portal: join failed: {:?}", e);
            return false;
        }

        let mut waited = 0;
        while !net.is_station_connected() {
            if waited >= STATION_CONNECT_TIMEOUT_MS {
                log::warn!("portal: no link after {} ms", waited);
                return false;
            }
            self.delay.delay_ms(STATION_POLL_INTERVAL_MS).await;
            waited += STATION_POLL_INTERVAL_MS;
        }
        true
    }

    async fn start_access_point<N: PortalNetwork>(&mut self, net: &mut N) {
        log::info!(
            "portal: starting access point '{}' on {}",
            ACCESS_POINT.ssid,
            ACCESS_POINT.address
        );
        if let Err(e) = net.start_access_point(&ACCESS_POINT).await {
            log::error!("portal: failed to start access point: {:?}", e);
            return;
        }
        if let Err(e) = net.start_captive_services(DNS_PORT, HTTP_PORT).await {
            log::error!("portal: failed to start captive services: {:?}", e);
        }
    }

    async fn handle_dns<N: PortalNetwork>(&mut self, net: &mut N) {
        let mut query = [0u8; DNS_PACKET_SIZE];
        let Some((len, peer)) = net.poll_dns(&mut query).await else {
            return;
        };

        let mut reply = [0u8; DNS_PACKET_SIZE];
        let Some(reply_len) =
            dns::build_captive_response(&query[..len], ACCESS_POINT.address, &mut reply)
        else {
            log::debug!("dns: dropped {} byte packet", len);
            return;
        };
        if let Err(e) = net.send_dns(&reply[..reply_len], peer).await {
            log::warn!("dns: failed to reply: {:?}", e);
        }
    }

    async fn handle_request<C>(&mut self, conn: &mut HttpConnection<C>) -> HttpResult
    where
        C: embedded_io_async::Read + embedded_io_async::Write,
    {
        match conn.route() {
            (HttpMethod::Get, "/") => self.serve_form(conn).await,
            (HttpMethod::Post, "/save") => self.handle_save(conn).await,
            (HttpMethod::Post, "/reset") => self.handle_reset(conn).await,
            _ => conn.redirect("/").await,
        }
    }

    async fn serve_form<C>(&mut self, conn: &mut HttpConnection<C>) -> HttpResult
    where
        C: embedded_io_async::Read + embedded_io_async::Write,
    {
        let html = render_form(&self.config);
        conn.write_html(ResponseHeaders::success(), &html).await
    }

    async fn handle_save<C>(&mut self, conn: &mut HttpConnection<C>) -> HttpResult
    where
        C: embedded_io_async::Read + embedded_io_async::Write,
    {
        self.config.wifi_ssid = read_field(conn, "ssid").await?;
        self.config.wifi_password = read_field(conn, "pass").await?;
        self.config.mqtt_server = read_field(conn, "mqtt").await?;
        self.config.mqtt_port = conn
            .form_field::<PORT_FIELD_SIZE>("port")
            .await?
            .map_or(0, |port| parse_int_lenient(&port));
        self.config.mqtt_user = read_field(conn, "muser").await?;
        self.config.mqtt_password = read_field(conn, "mpass").await?;

        if let Err(e) = self.store.save(&self.config) {
            log::error!("portal: failed to save configuration: {}", e);
            return conn
                .write_text(ResponseHeaders::internal_error(), "failed to save configuration")
                .await;
        }
        log::info!("portal: configuration saved");

        let html = render_notice("Configuration saved");
        conn.write_html(ResponseHeaders::success(), &html).await?;
        self.restart().await;
        Ok(())
    }

    async fn handle_reset<C>(&mut self, conn: &mut HttpConnection<C>) -> HttpResult
    where
        C: embedded_io_async::Read + embedded_io_async::Write,
    {
        if let Err(e) = self.reset() {
            log::error!("portal: failed to reset configuration: {}", e);
            return conn
                .write_text(ResponseHeaders::internal_error(), "failed to reset configuration")
                .await;
        }

        let html = render_notice("Configuration reset");
        conn.write_html(ResponseHeaders::success(), &html).await?;
        self.restart().await;
        Ok(())
    }

    async fn restart(&mut self) {
        self.delay.delay_ms(RESTART_DELAY_MS).await;
        log::info!("portal: restarting");
        self.platform.restart();
    }
}

/// Form field, empty when absent
async fn read_field<C>(conn: &mut HttpConnection<C>, name: &str) -> Result<FieldString, http::Error>
where
    C: embedded_io_async::Read + embedded_io_async::Write,
{
    Ok(conn
        .form_field::<MAX_FIELD_LEN>(name)
        .await?
        .unwrap_or_default())
}
