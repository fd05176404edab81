use core::fmt::{self, Write as _};

use heapless::String;
use serde::Serialize;

use crate::config::TOPIC_ROOT;

/// Command addressed to the node, parsed from an inbound topic.
///
/// Topic shape: `home/<location>/<device_id>/<device>/<action>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub location: &'a str,
    pub device_id: &'a str,
    pub device: &'a str,
    pub action: &'a str,
    pub payload: &'a str,
}

impl<'a> ParsedCommand<'a> {
    /// Parse a command topic.
    ///
    /// Returns `None` unless the topic has exactly five non-empty segments
    /// and starts with the topic root.
    pub fn parse(topic: &'a str, payload: &'a str) -> Option<Self> {
        let mut segments = topic.split('/');
        if segments.next()? != TOPIC_ROOT {
            return None;
        }
        let mut next = || segments.next().filter(|segment| !segment.is_empty());
        let location = next()?;
        let device_id = next()?;
        let device = next()?;
        let action = next()?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            location,
            device_id,
            device,
            action,
            payload,
        })
    }
}

/// Value published on a sensor state topic
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue<'a> {
    Float(f32),
    Int(i32),
    Text(&'a str),
    /// Rendered as `ON` / `OFF`
    Switch(bool),
}

/// Capacity of a rendered number or switch state. Fits any `f32` at two
/// decimals.
pub const VALUE_SIZE: usize = 48;

impl<'a> SensorValue<'a> {
    /// State payload of the value.
    ///
    /// Text is passed through as given. Numbers and switch states are
    /// rendered into `scratch`.
    pub fn payload<'s>(&self, scratch: &'s mut String<VALUE_SIZE>) -> &'s str
    where
        'a: 's,
    {
        match *self {
            SensorValue::Text(text) => text,
            other => {
                scratch.clear();
                // Cannot fail, `f32::MIN` is the longest at 43 bytes
                let _ = write!(scratch, "{}", other);
                scratch.as_str()
            }
        }
    }
}

impl fmt::Display for SensorValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Float(value) => write!(f, "{:.2}", value),
            SensorValue::Int(value) => write!(f, "{}", value),
            SensorValue::Text(value) => f.write_str(value),
            SensorValue::Switch(true) => f.write_str("ON"),
            SensorValue::Switch(false) => f.write_str("OFF"),
        }
    }
}

impl From<f32> for SensorValue<'_> {
    fn from(value: f32) -> Self {
        SensorValue::Float(value)
    }
}

impl From<i32> for SensorValue<'_> {
    fn from(value: i32) -> Self {
        SensorValue::Int(value)
    }
}

impl From<bool> for SensorValue<'_> {
    fn from(value: bool) -> Self {
        SensorValue::Switch(value)
    }
}

impl<'a> From<&'a str> for SensorValue<'a> {
    fn from(value: &'a str) -> Self {
        SensorValue::Text(value)
    }
}

/// Home Assistant discovery descriptor of a single entity
#[derive(Debug, Serialize)]
pub struct DiscoveryDescriptor<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<&'a str>,
    pub state_topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'a str>,
    pub unique_id: &'a str,
}

/// Treat an empty attribute as absent
pub(crate) fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_command() {
        let command = ParsedCommand::parse("home/salon/device7/lamp/set", "ON").unwrap();
        assert_eq!(command.location, "salon");
        assert_eq!(command.device_id, "device7");
        assert_eq!(command.device, "lamp");
        assert_eq!(command.action, "set");
        assert_eq!(command.payload, "ON");
    }

    #[test]
    fn rejects_short_topics() {
        assert!(ParsedCommand::parse("home/salon/device7/lamp", "ON").is_none());
        assert!(ParsedCommand::parse("home/esp32-AABB/lamp/set", "ON").is_none());
        assert!(ParsedCommand::parse("home", "ON").is_none());
        assert!(ParsedCommand::parse("", "ON").is_none());
    }

    #[test]
    fn rejects_foreign_root_and_extra_segments() {
        assert!(ParsedCommand::parse("office/salon/device7/lamp/set", "ON").is_none());
        assert!(ParsedCommand::parse("home/salon/device7/lamp/set/extra", "ON").is_none());
        assert!(ParsedCommand::parse("home/salon//lamp/set", "ON").is_none());
    }

    #[test]
    fn renders_sensor_values() {
        let mut scratch = String::new();
        assert_eq!(SensorValue::from(21.5_f32).payload(&mut scratch), "21.50");
        assert_eq!(SensorValue::from(-3).payload(&mut scratch), "-3");
        assert_eq!(SensorValue::from(true).payload(&mut scratch), "ON");
        assert_eq!(SensorValue::from(false).payload(&mut scratch), "OFF");
        assert_eq!(SensorValue::from(f32::MIN).payload(&mut scratch).len(), 43);
    }

    #[test]
    fn text_is_passed_through_whole() {
        let long = "x".repeat(80);
        let mut scratch = String::new();
        assert_eq!(SensorValue::from(long.as_str()).payload(&mut scratch), long);
        assert!(scratch.is_empty());
    }

    #[test]
    fn descriptor_skips_absent_fields() {
        let descriptor = DiscoveryDescriptor {
            name: "Temperature",
            device_class: non_empty("temperature"),
            command_topic: None,
            state_topic: "home/salon/esp32-AA/temp/state",
            unit_of_measurement: non_empty(""),
            unique_id: "esp32_AA_temp",
        };
        let mut buf = [0u8; 256];
        let len = serde_json_core::to_slice(&descriptor, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Temperature","device_class":"temperature","state_topic":"home/salon/esp32-AA/temp/state","unique_id":"esp32_AA_temp"}"#
        );
    }
}
