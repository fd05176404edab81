//! In-memory doubles for the port traits.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use smarthome_node::config::AccessPointConfig;
use smarthome_node::domain::entity::Credentials;
use smarthome_node::domain::ports::{
    KeyValueStore,
    NvRegion,
    Platform,
    PortalNetwork,
    PubSubClient,
    StorageError,
};
use smarthome_node::infrastructure::repositories::REGION_SIZE;

pub fn bounded<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for c in value.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Storage
// -----------------------------------------------------------------------------

/// EEPROM style region, erased to `0xFF`
pub struct MemRegion {
    pub data: [u8; REGION_SIZE],
    pub commits: usize,
}

impl MemRegion {
    pub fn erased() -> Self {
        Self {
            data: [0xFF; REGION_SIZE],
            commits: 0,
        }
    }
}

impl NvRegion for MemRegion {
    fn capacity(&self) -> usize {
        REGION_SIZE
    }

    fn read_bytes(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .data
            .get(offset..offset + buffer.len())
            .ok_or(StorageError::OutOfBounds)?;
        buffer.copy_from_slice(src);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let dst = self
            .data
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.commits += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    Str(std::string::String),
    Int(i32),
}

/// Preferences style store
#[derive(Default)]
pub struct MemKv {
    pub entries: BTreeMap<std::string::String, KvValue>,
    pub clears: usize,
}

impl KeyValueStore for MemKv {
    fn get_str<const N: usize>(&mut self, key: &str, default: &str) -> String<N> {
        match self.entries.get(key) {
            Some(KvValue::Str(value)) => bounded(value),
            _ => bounded(default),
        }
    }

    fn get_i32(&mut self, key: &str, default: i32) -> i32 {
        match self.entries.get(key) {
            Some(KvValue::Int(value)) => *value,
            _ => default,
        }
    }

    fn put_str(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.into(), KvValue::Str(value.into()));
        Ok(())
    }

    fn put_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        self.entries.insert(key.into(), KvValue::Int(value));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        self.clears += 1;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Pub/sub
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: std::string::String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }
}

/// Scriptable broker session
#[derive(Default)]
pub struct MockClient {
    pub connected: bool,
    /// Outcome of every connect call
    pub accept_connect: bool,
    pub fail_publish: bool,
    pub connects: usize,
    pub polls: usize,
    pub server: Option<(std::string::String, u16)>,
    pub last_client_id: Option<std::string::String>,
    pub last_login: Option<(std::string::String, std::string::String)>,
    pub subscriptions: Vec<std::string::String>,
    pub published: Vec<Published>,
    pub inbound: VecDeque<(std::string::String, Vec<u8>)>,
}

impl MockClient {
    pub fn online() -> Self {
        Self {
            accept_connect: true,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }
}

impl PubSubClient for MockClient {
    type Error = &'static str;

    fn set_server(&mut self, host: &str, port: u16) {
        self.server = Some((host.into(), port));
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error> {
        self.connects += 1;
        self.last_client_id = Some(client_id.into());
        self.last_login = credentials.map(|c| (c.username.into(), c.password.into()));
        if self.accept_connect {
            self.connected = true;
            Ok(())
        } else {
            Err("refused")
        }
    }

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(topic_filter.into());
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        if self.fail_publish || !self.connected {
            return Err("not published");
        }
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    async fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error> {
        self.polls += 1;
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_message(&topic, &payload);
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Platform and time
// -----------------------------------------------------------------------------

pub struct MockPlatform {
    pub hwid: &'static str,
    pub restarts: usize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            hwid: "A1B2C3D4E5F6",
            restarts: 0,
        }
    }
}

impl Platform for MockPlatform {
    fn hardware_id(&self) -> &str {
        self.hwid
    }

    fn platform_tag(&self) -> &'static str {
        "esp32"
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

/// Returns immediately and records every requested delay
#[derive(Default)]
pub struct NoopDelay {
    pub delays_ms: Vec<u32>,
}

impl NoopDelay {
    pub fn total_ms(&self) -> u32 {
        self.delays_ms.iter().sum()
    }
}

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.delays_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.delays_ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

// -----------------------------------------------------------------------------
// Network
// -----------------------------------------------------------------------------

/// Client side of an HTTP exchange
pub struct MockStream<'a> {
    input: Vec<u8>,
    position: usize,
    output: &'a mut Vec<u8>,
}

impl embedded_io_async::ErrorType for MockStream<'_> {
    type Error = Infallible;
}

impl embedded_io_async::Read for MockStream<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = &self.input[self.position..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.position += n;
        Ok(n)
    }
}

impl embedded_io_async::Write for MockStream<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }
}

#[derive(Default)]
pub struct MockNetwork {
    pub join_fails: bool,
    /// Station link comes up after this many polls, never if `None`
    pub link_after_polls: Option<usize>,
    pub link_polls: Cell<usize>,
    pub joined: Option<(std::string::String, std::string::String)>,
    pub access_point: Option<(std::string::String, std::string::String, std::net::Ipv4Addr)>,
    pub services: Option<(u16, u16)>,
    pub dns_queries: VecDeque<Vec<u8>>,
    pub dns_replies: Vec<(Vec<u8>, u16)>,
    pub http_requests: VecDeque<Vec<u8>>,
    pub http_responses: Vec<Vec<u8>>,
}

impl MockNetwork {
    pub fn push_http(&mut self, request: &str) {
        self.http_requests.push_back(request.as_bytes().to_vec());
    }

    pub fn last_response(&self) -> &str {
        std::str::from_utf8(self.http_responses.last().unwrap()).unwrap()
    }
}

impl PortalNetwork for MockNetwork {
    type Error = &'static str;
    type Peer = u16;
    type Connection<'a> = MockStream<'a>;

    async fn join_station(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        self.joined = Some((ssid.into(), password.into()));
        if self.join_fails { Err("join failed") } else { Ok(()) }
    }

    fn is_station_connected(&self) -> bool {
        let polls = self.link_polls.get() + 1;
        self.link_polls.set(polls);
        self.link_after_polls.is_some_and(|after| polls > after)
    }

    async fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), Self::Error> {
        self.access_point = Some((config.ssid.into(), config.password.into(), config.address));
        Ok(())
    }

    async fn start_captive_services(
        &mut self,
        dns_port: u16,
        http_port: u16,
    ) -> Result<(), Self::Error> {
        self.services = Some((dns_port, http_port));
        Ok(())
    }

    async fn poll_dns(&mut self, buffer: &mut [u8]) -> Option<(usize, Self::Peer)> {
        let query = self.dns_queries.pop_front()?;
        buffer[..query.len()].copy_from_slice(&query);
        Some((query.len(), 5353))
    }

    async fn send_dns(&mut self, packet: &[u8], peer: Self::Peer) -> Result<(), Self::Error> {
        self.dns_replies.push((packet.to_vec(), peer));
        Ok(())
    }

    async fn poll_http(&mut self) -> Option<Self::Connection<'_>> {
        let input = self.http_requests.pop_front()?;
        self.http_responses.push(Vec::new());
        let output = self.http_responses.last_mut()?;
        Some(MockStream {
            input,
            position: 0,
            output,
        })
    }
}
