//! Topic addressing and publishing
//!
//! Topics follow `home/<location>/<device-id>/<device>/<kind>`. The location
//! segment is omitted when empty.

use core::fmt::{self, Write};

use heapless::String;

use crate::config::{COMMAND_ACTION, EXTRA_COMMAND_LOCATIONS, TOPIC_ROOT};
use crate::domain::entity::{Credentials, DeviceIdentity, FieldString, bounded};
use crate::domain::ports::PubSubClient;

/// Maximum length of a topic
pub const TOPIC_SIZE: usize = 128;

pub type TopicString = String<TOPIC_SIZE>;

/// Builds topics for the node and keeps its broker session alive
pub struct TopicManager<C> {
    client: C,
    identity: DeviceIdentity,
    extra_locations: &'static [&'static str],
    login: Option<(FieldString, FieldString)>,
}

impl<C: PubSubClient> TopicManager<C> {
    pub fn new(client: C, identity: DeviceIdentity) -> Self {
        Self {
            client,
            identity,
            extra_locations: EXTRA_COMMAND_LOCATIONS,
            login: None,
        }
    }

    /// Broker login used by the next connect
    pub fn set_credentials(&mut self, credentials: Option<Credentials<'_>>) {
        self.login = credentials
            .map(|creds| (bounded(creds.username), bounded(creds.password)));
    }

    pub fn set_server(&mut self, host: &str, port: u16) {
        self.client.set_server(host, port);
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// `home/[<location>/]<device-id>`, `None` if it does not fit
    pub fn base_topic(&self, location: &str) -> Option<TopicString> {
        let mut topic = TopicString::new();
        self.write_topic(&mut topic, location, None).ok()?;
        Some(topic)
    }

    /// `<base_topic(location)>/<device>/<kind>`, `None` if it does not fit
    pub fn topic(&self, location: &str, device: &str, kind: &str) -> Option<TopicString> {
        let mut topic = TopicString::new();
        self.write_topic(&mut topic, location, Some((device, kind)))
            .ok()?;
        Some(topic)
    }

    fn write_topic(
        &self,
        out: &mut TopicString,
        location: &str,
        leaf: Option<(&str, &str)>,
    ) -> fmt::Result {
        write!(out, "{}/", TOPIC_ROOT)?;
        if !location.is_empty() {
            write!(out, "{}/", location)?;
        }
        out.write_str(&self.identity.device_id())?;
        if let Some((device, kind)) = leaf {
            write!(out, "/{}/{}", device, kind)?;
        }
        Ok(())
    }

    /// Publish a text payload to `topic(location, device, kind)`.
    ///
    /// Returns false if the topic does not fit or the transport rejected the
    /// message.
    pub async fn publish(
        &mut self,
        location: &str,
        device: &str,
        kind: &str,
        payload: &str,
        retained: bool,
    ) -> bool {
        let Some(topic) = self.topic(location, device, kind) else {
            log::warn!("mqtt: topic for {}/{}/{} is too long", location, device, kind);
            return false;
        };
        self.publish_raw(&topic, payload.as_bytes(), retained).await
    }

    /// Publish a boolean as `true` / `false`
    pub async fn publish_flag(
        &mut self,
        location: &str,
        device: &str,
        kind: &str,
        value: bool,
        retained: bool,
    ) -> bool {
        let payload = if value { "true" } else { "false" };
        self.publish(location, device, kind, payload, retained).await
    }

    /// Publish to an already built topic
    pub async fn publish_raw(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        match self.client.publish(topic, payload, retained).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("mqtt: failed to publish to {}: {:?}", topic, e);
                false
            }
        }
    }

    /// Make sure the session is up.
    ///
    /// Does nothing when already connected. Otherwise makes a single connect
    /// attempt and subscribes every command subtree again on success.
    pub async fn ensure_connected(&mut self) -> bool {
        if self.client.is_connected() {
            return true;
        }

        let client_id = self.identity.client_id();
        let credentials = self.login.as_ref().map(|(username, password)| Credentials {
            username: username.as_str(),
            password: password.as_str(),
        });
        if let Err(e) = self.client.connect(&client_id, credentials).await {
            log::warn!("mqtt: connect as {} failed: {:?}", client_id, e);
            return false;
        }
        log::info!("mqtt: connected as {}", client_id);

        self.subscribe_commands("").await;
        for location in self.extra_locations {
            self.subscribe_commands(location).await;
        }
        true
    }

    async fn subscribe_commands(&mut self, location: &str) {
        let Some(filter) = self.topic(location, "+", COMMAND_ACTION) else {
            log::warn!("mqtt: command filter for '{}' is too long", location);
            return;
        };
        if let Err(e) = self.client.subscribe(&filter).await {
            log::warn!("mqtt: failed to subscribe {}: {:?}", filter, e);
        }
    }
}
