//! MQTT command dispatcher
//!
//! Keeps the broker session alive from a periodic tick and routes inbound
//! `set` commands to the device logic.

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};

use super::discovery::DiscoveryAnnouncer;
use super::topics::TopicManager;
use crate::config::{
    BLOCKING_RECONNECT_DELAY_MS,
    COMMAND_ACTION,
    INBOUND_BUFFER_SIZE,
    RECONNECT_INTERVAL,
    STATE_KIND,
};
use crate::domain::dto::{ParsedCommand, SensorValue};
use crate::domain::entity::{Credentials, DeviceIdentity};
use crate::domain::ports::{CommandHandler, PubSubClient};

/// MQTT bridge of a node: session upkeep, telemetry and command dispatch
pub struct MqttDevice<C, D, H> {
    topics: TopicManager<C>,
    delay: D,
    handler: H,
    last_reconnect_attempt: Option<Instant>,
}

impl<C, D, H> MqttDevice<C, D, H>
where
    C: PubSubClient,
    D: DelayNs,
    H: CommandHandler,
{
    pub fn new(client: C, identity: DeviceIdentity, delay: D, handler: H) -> Self {
        Self::from_topics(TopicManager::new(client, identity), delay, handler)
    }

    pub fn from_topics(topics: TopicManager<C>, delay: D, handler: H) -> Self {
        Self {
            topics,
            delay,
            handler,
            last_reconnect_attempt: None,
        }
    }

    /// Point the session at a broker and make a first connect attempt
    pub async fn begin(
        &mut self,
        server: &str,
        port: u16,
        credentials: Option<Credentials<'_>>,
    ) -> bool {
        self.topics.set_server(server, port);
        self.topics.set_credentials(credentials);
        self.reconnect().await
    }

    /// Tick the session.
    ///
    /// While disconnected, attempts a reconnect once per
    /// [`RECONNECT_INTERVAL`]. While connected, services the client once and
    /// dispatches inbound messages.
    pub async fn handle(&mut self, now: Instant) {
        if !self.topics.is_connected() {
            let due = self
                .last_reconnect_attempt
                .is_none_or(|last| now.saturating_duration_since(last) >= RECONNECT_INTERVAL);
            if due {
                log::info!("mqtt: attempting reconnect");
                if self.reconnect().await {
                    log::info!("mqtt: reconnected");
                } else {
                    log::warn!("mqtt: reconnect failed");
                }
                self.last_reconnect_attempt = Some(now);
            }
            return;
        }

        let handler = &mut self.handler;
        let result = self
            .topics
            .client_mut()
            .poll(&mut |topic: &str, payload: &[u8]| {
                dispatch_message(&mut *handler, topic, payload);
            })
            .await;
        if let Err(e) = result {
            log::warn!("mqtt: session error: {:?}", e);
        }
    }

    /// Retry connecting until the broker accepts the session
    pub async fn connect_blocking(&mut self) {
        while !self.reconnect().await {
            log::warn!(
                "mqtt: connect failed, retrying in {} ms",
                BLOCKING_RECONNECT_DELAY_MS
            );
            self.delay.delay_ms(BLOCKING_RECONNECT_DELAY_MS).await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.topics.is_connected()
    }

    /// Publish a retained value on `topic(location, sensor, "state")`
    pub async fn publish_sensor_data<'v>(
        &mut self,
        location: &str,
        sensor: &str,
        value: impl Into<SensorValue<'v>>,
    ) -> bool {
        let mut scratch = String::new();
        let payload = value.into().payload(&mut scratch);
        self.topics
            .publish(location, sensor, STATE_KIND, payload, true)
            .await
    }

    /// Discovery announcer bound to this device's session
    pub fn discovery(&mut self) -> DiscoveryAnnouncer<'_, C, D> {
        DiscoveryAnnouncer::new(&mut self.topics, &mut self.delay)
    }

    pub fn topics(&self) -> &TopicManager<C> {
        &self.topics
    }

    pub fn topics_mut(&mut self) -> &mut TopicManager<C> {
        &mut self.topics
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn reconnect(&mut self) -> bool {
        self.topics.ensure_connected().await
    }
}

/// Route one inbound message to `handler`.
///
/// Topic and payload are copied into bounded buffers first; anything past
/// `INBOUND_BUFFER_SIZE - 1` bytes is dropped.
pub fn dispatch_message<H: CommandHandler>(handler: &mut H, topic: &str, payload: &[u8]) {
    let topic = truncate_topic(topic);
    let payload = truncate_payload(payload);
    let payload = utf8_prefix(&payload);
    log::debug!("mqtt: message on {}: {}", topic, payload);

    let Some(command) = ParsedCommand::parse(&topic, payload) else {
        log::debug!("mqtt: ignoring malformed topic {}", topic);
        return;
    };

    if command.action == COMMAND_ACTION {
        handler.handle_command(command.location, command.device, command.payload);
    } else {
        log::debug!("mqtt: ignoring action {}", command.action);
    }
}

fn truncate_topic(topic: &str) -> String<{ INBOUND_BUFFER_SIZE - 1 }> {
    crate::domain::entity::bounded(topic)
}

fn truncate_payload(payload: &[u8]) -> Vec<u8, { INBOUND_BUFFER_SIZE - 1 }> {
    let len = payload.len().min(INBOUND_BUFFER_SIZE - 1);
    Vec::from_slice(&payload[..len]).unwrap_or_default()
}

fn utf8_prefix(bytes: &[u8]) -> &str {
    match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}
