//! Broker session handle
//!
//! The session runs in [`mqtt_session_task`], which owns the `myrtio_mqtt`
//! client. [`EspMqttClient`] forwards every request to it over static
//! channels and waits for the reply.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_executor::{SpawnError, Spawner};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};
use heapless::{String, Vec};
use smarthome_node::config::MAX_FIELD_LEN;
use smarthome_node::domain::entity::{Credentials, bounded};
use smarthome_node::domain::ports::PubSubClient;

use crate::config::MQTT;
use crate::infrastructure::tasks::mqtt_session_task;

pub(crate) const TOPIC_SIZE: usize = 128;
pub(crate) const PAYLOAD_SIZE: usize = 512;
/// Encode buffer of the client, also used to rewrite outgoing packets
pub(crate) const PACKET_BUFFER_SIZE: usize = 1024;

const REQUEST_CH_CAP: usize = 2;
const INBOUND_CH_CAP: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MqttError {
    Resolve,
    Connect,
    /// The broker refused or dropped the session
    Session,
    TooLarge,
    Timeout,
    NotConnected,
}

pub(crate) struct Login {
    pub username: String<MAX_FIELD_LEN>,
    pub password: String<MAX_FIELD_LEN>,
}

pub(crate) struct SessionTarget {
    pub host: String<MAX_FIELD_LEN>,
    pub port: u16,
    pub login: Option<Login>,
}

pub(crate) struct OutboundMessage {
    pub topic: String<TOPIC_SIZE>,
    pub payload: Vec<u8, PAYLOAD_SIZE>,
    pub retain: bool,
}

pub(crate) struct InboundMessage {
    pub topic: String<TOPIC_SIZE>,
    pub payload: Vec<u8, PAYLOAD_SIZE>,
}

#[allow(clippy::large_enum_variant)]
pub(crate) enum SessionRequest {
    Connect(SessionTarget),
    Subscribe(String<TOPIC_SIZE>),
    Publish(OutboundMessage),
}

pub(crate) static SESSION_REQUESTS: Channel<CriticalSectionRawMutex, SessionRequest, REQUEST_CH_CAP> =
    Channel::new();
pub(crate) static SESSION_REPLIES: Channel<CriticalSectionRawMutex, Result<(), MqttError>, 1> =
    Channel::new();
pub(crate) static INBOUND_MESSAGES: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_CH_CAP> =
    Channel::new();
/// Set by the session task while the broker session is up
pub(crate) static SESSION_UP: AtomicBool = AtomicBool::new(false);

pub(crate) struct EspMqttClient {
    client_id: &'static str,
    host: String<MAX_FIELD_LEN>,
    port: u16,
}

impl EspMqttClient {
    /// Spawn the session task on `stack`. Must be called once.
    ///
    /// `client_id` identifies every session the task opens.
    pub(crate) fn new(
        spawner: Spawner,
        stack: Stack<'static>,
        client_id: &'static str,
    ) -> Result<Self, SpawnError> {
        spawner.spawn(mqtt_session_task(stack, client_id))?;
        Ok(Self {
            client_id,
            host: String::new(),
            port: 0,
        })
    }

    async fn request(&mut self, request: SessionRequest, timeout: Duration) -> Result<(), MqttError> {
        // A reply left over from a timed out request
        while SESSION_REPLIES.try_receive().is_ok() {}

        SESSION_REQUESTS.send(request).await;
        with_timeout(timeout, SESSION_REPLIES.receive())
            .await
            .map_err(|_| MqttError::Timeout)?
    }
}

impl PubSubClient for EspMqttClient {
    type Error = MqttError;

    fn set_server(&mut self, host: &str, port: u16) {
        self.host = bounded(host);
        self.port = port;
    }

    fn is_connected(&self) -> bool {
        SESSION_UP.load(Ordering::Relaxed)
    }

    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), MqttError> {
        if client_id != self.client_id {
            log::warn!(
                "mqtt: session uses client id {} instead of {}",
                self.client_id,
                client_id
            );
        }
        let target = SessionTarget {
            host: self.host.clone(),
            port: self.port,
            login: credentials.map(|credentials| Login {
                username: bounded(credentials.username),
                password: bounded(credentials.password),
            }),
        };
        log::info!("mqtt: connecting to {}:{}", self.host, self.port);
        self.request(SessionRequest::Connect(target), MQTT.connect_timeout * 3)
            .await
    }

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let filter = String::try_from(topic_filter).map_err(|()| MqttError::TooLarge)?;
        self.request(SessionRequest::Subscribe(filter), MQTT.request_timeout)
            .await
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let message = OutboundMessage {
            topic: String::try_from(topic).map_err(|()| MqttError::TooLarge)?,
            payload: Vec::from_slice(payload).map_err(|()| MqttError::TooLarge)?,
            retain,
        };
        self.request(SessionRequest::Publish(message), MQTT.request_timeout)
            .await
    }

    async fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        while let Ok(message) = INBOUND_MESSAGES.try_receive() {
            on_message(&message.topic, &message.payload);
        }
        Ok(())
    }
}
