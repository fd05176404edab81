//! Home Assistant MQTT discovery
//!
//! Announces entities on `homeassistant/<type>/<entity>/config` with a
//! retained JSON descriptor.

use core::fmt::Write as _;

use embedded_hal_async::delay::DelayNs;
use heapless::String;

use super::topics::{TopicManager, TopicString};
use crate::config::{
    ANNOUNCE_ATTEMPTS,
    ANNOUNCE_RETRY_DELAY_MS,
    ANNOUNCE_SETTLE_DELAY_MS,
    COMMAND_ACTION,
    DISCOVERY_PAYLOAD_SIZE,
    DISCOVERY_PREFIX,
    STATE_KIND,
};
use crate::domain::dto::{DiscoveryDescriptor, non_empty};
use crate::domain::ports::PubSubClient;

/// Publishes discovery descriptors through a borrowed [`TopicManager`]
pub struct DiscoveryAnnouncer<'a, C, D> {
    topics: &'a mut TopicManager<C>,
    delay: &'a mut D,
}

impl<'a, C: PubSubClient, D: DelayNs> DiscoveryAnnouncer<'a, C, D> {
    pub fn new(topics: &'a mut TopicManager<C>, delay: &'a mut D) -> Self {
        Self { topics, delay }
    }

    /// Announce a sensor reporting on `topic(location, sensor, "state")`.
    ///
    /// Empty `device_class` and `unit` are left out of the descriptor.
    pub async fn sensor_config(
        &mut self,
        location: &str,
        sensor: &str,
        device_class: &str,
        unit: &str,
        friendly_name: &str,
    ) -> bool {
        let (Some(state_topic), Some(unique_id), Some(entity)) = (
            self.topics.topic(location, sensor, STATE_KIND),
            self.topics.identity().unique_id(sensor),
            location_entity(location, sensor),
        ) else {
            log::warn!("discovery: names of sensor {}/{} are too long", location, sensor);
            return false;
        };
        let descriptor = DiscoveryDescriptor {
            name: friendly_name,
            device_class: non_empty(device_class),
            command_topic: None,
            state_topic: &state_topic,
            unit_of_measurement: non_empty(unit),
            unique_id: &unique_id,
        };

        self.announce("sensor", &entity, &descriptor).await
    }

    /// Announce a switch commanded on `topic(location, switch, "set")`
    pub async fn switch_config(
        &mut self,
        location: &str,
        switch: &str,
        friendly_name: &str,
    ) -> bool {
        let (Some(command_topic), Some(state_topic), Some(unique_id)) = (
            self.topics.topic(location, switch, COMMAND_ACTION),
            self.topics.topic(location, switch, STATE_KIND),
            self.topics.identity().unique_id(switch),
        ) else {
            log::warn!("discovery: names of switch {}/{} are too long", location, switch);
            return false;
        };
        let descriptor = DiscoveryDescriptor {
            name: friendly_name,
            device_class: None,
            command_topic: Some(command_topic.as_str()),
            state_topic: &state_topic,
            unit_of_measurement: None,
            unique_id: &unique_id,
        };

        self.announce("switch", switch, &descriptor).await
    }

    pub async fn binary_sensor_config(
        &mut self,
        location: &str,
        sensor: &str,
        device_class: &str,
        friendly_name: &str,
    ) -> bool {
        let (Some(state_topic), Some(unique_id), Some(entity)) = (
            self.topics.topic(location, sensor, STATE_KIND),
            self.topics.identity().unique_id(sensor),
            location_entity(location, sensor),
        ) else {
            log::warn!("discovery: names of binary sensor {}/{} are too long", location, sensor);
            return false;
        };
        let descriptor = DiscoveryDescriptor {
            name: friendly_name,
            device_class: Some(device_class),
            command_topic: None,
            state_topic: &state_topic,
            unit_of_measurement: None,
            unique_id: &unique_id,
        };

        self.announce("binary_sensor", &entity, &descriptor).await
    }

    /// Publish `descriptor` retained to the discovery topic of the entity.
    ///
    /// Every attempt first makes sure the session is up. Gives up after
    /// [`ANNOUNCE_ATTEMPTS`] attempts, or at once if the topic does not fit.
    pub async fn announce(
        &mut self,
        device_type: &str,
        entity_name: &str,
        descriptor: &DiscoveryDescriptor<'_>,
    ) -> bool {
        let Some(topic) = config_topic(device_type, entity_name) else {
            log::warn!("discovery: topic of {} {} is too long", device_type, entity_name);
            return false;
        };
        let mut payload = [0u8; DISCOVERY_PAYLOAD_SIZE];
        let len = match serde_json_core::to_slice(descriptor, &mut payload) {
            Ok(len) => len,
            Err(e) => {
                log::warn!("discovery: failed to serialize {}: {:?}", topic, e);
                return false;
            }
        };

        for attempt in 1..=ANNOUNCE_ATTEMPTS {
            if !self.topics.ensure_connected().await {
                log::warn!("discovery: broker unreachable (attempt {})", attempt);
            } else if self.topics.publish_raw(&topic, &payload[..len], true).await {
                log::info!("discovery: announced {}", topic);
                self.delay.delay_ms(ANNOUNCE_SETTLE_DELAY_MS).await;
                return true;
            } else {
                log::warn!("discovery: publish of {} failed (attempt {})", topic, attempt);
            }

            if attempt < ANNOUNCE_ATTEMPTS {
                self.delay.delay_ms(ANNOUNCE_RETRY_DELAY_MS).await;
            }
        }

        log::warn!("discovery: giving up on {}", topic);
        false
    }
}

fn location_entity(location: &str, entity: &str) -> Option<String<64>> {
    let mut name = String::new();
    write!(name, "{}_{}", location, entity).ok()?;
    Some(name)
}

/// `homeassistant/<type>/<entity>/config`, `None` if it does not fit
pub fn config_topic(device_type: &str, entity_name: &str) -> Option<TopicString> {
    let mut topic = TopicString::new();
    write!(
        topic,
        "{}/{}/{}/config",
        DISCOVERY_PREFIX, device_type, entity_name
    )
    .ok()?;
    Some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_topic_shape() {
        assert_eq!(
            config_topic("sensor", "salon_temp").as_deref(),
            Some("homeassistant/sensor/salon_temp/config")
        );
        assert_eq!(location_entity("salon", "temp").as_deref(), Some("salon_temp"));
    }

    #[test]
    fn long_entity_names_do_not_fit() {
        let location = "ground_floor_living_room_east_wing";
        let sensor = "temperature_sensor_near_the_window_a";
        assert!(location_entity(location, sensor).is_none());
        assert!(config_topic("sensor", &"e".repeat(120)).is_none());
    }
}
