//! Integration tests for topic addressing, discovery and command dispatch.

mod common;

use common::{MockClient, NoopDelay};
use embassy_futures::block_on;
use embassy_time::{Duration, Instant};
use smarthome_node::app::{DiscoveryAnnouncer, MqttDevice, TopicManager};
use smarthome_node::domain::entity::{Credentials, DeviceIdentity};

type Calls = Vec<(String, String, String)>;

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("esp32", "A1B2C3D4E5F6")
}

fn ignore(_location: &str, _device: &str, _value: &str) {}

fn quiet_device(client: MockClient) -> MqttDevice<MockClient, NoopDelay, fn(&str, &str, &str)> {
    MqttDevice::new(client, identity(), NoopDelay::default(), ignore as fn(&str, &str, &str))
}

fn recording_device(
    calls: &mut Calls,
) -> MqttDevice<MockClient, NoopDelay, impl FnMut(&str, &str, &str) + '_> {
    let handler = move |location: &str, device: &str, value: &str| {
        calls.push((location.into(), device.into(), value.into()));
    };
    MqttDevice::new(MockClient::online(), identity(), NoopDelay::default(), handler)
}

// -----------------------------------------------------------------------------
// Test 1: Topic shapes
// -----------------------------------------------------------------------------

#[test]
fn topic_extends_base_topic() {
    let topics = TopicManager::new(MockClient::online(), identity());

    let topic = topics.topic("kitchen", "plug1", "state").unwrap();
    assert_eq!(topic.as_str(), "home/kitchen/esp32-A1B2C3D4E5F6/plug1/state");
    assert_eq!(
        topic.as_str(),
        format!("{}/plug1/state", topics.base_topic("kitchen").unwrap())
    );
}

#[test]
fn oversized_topic_is_not_published() {
    let mut topics = TopicManager::new(MockClient::online(), identity());
    assert!(block_on(topics.ensure_connected()));
    let device = "d".repeat(120);

    assert!(topics.topic("salon", &device, "state").is_none());
    assert!(!block_on(topics.publish("salon", &device, "state", "1", true)));
    assert!(topics.client().published.is_empty());
}

#[test]
fn flags_are_published_as_true_and_false() {
    let mut topics = TopicManager::new(MockClient::online(), identity());
    assert!(block_on(topics.ensure_connected()));

    assert!(block_on(topics.publish_flag("salon", "door", "open", true, false)));
    assert!(block_on(topics.publish_flag("", "door", "open", false, true)));

    let published: Vec<_> = topics
        .client()
        .published
        .iter()
        .map(|p| (p.topic.as_str(), p.text(), p.retain))
        .collect();
    assert_eq!(
        published,
        [
            ("home/salon/esp32-A1B2C3D4E5F6/door/open", "true", false),
            ("home/esp32-A1B2C3D4E5F6/door/open", "false", true),
        ]
    );
}

#[test]
fn reconnect_subscribes_command_subtrees() {
    let mut topics = TopicManager::new(MockClient::online(), identity());
    topics.set_credentials(Some(Credentials {
        username: "node",
        password: "pw",
    }));

    assert!(block_on(topics.ensure_connected()));
    let client = topics.client();
    assert_eq!(client.last_client_id.as_deref(), Some("ESP32Client-A1B2C3D4E5F6"));
    assert_eq!(client.last_login, Some(("node".into(), "pw".into())));
    assert_eq!(
        client.subscriptions,
        ["home/esp32-A1B2C3D4E5F6/+/set", "home/salon/esp32-A1B2C3D4E5F6/+/set"]
    );

    // Already connected, nothing to do
    assert!(block_on(topics.ensure_connected()));
    assert_eq!(topics.client().connects, 1);
}

#[test]
fn sensor_values_are_published_retained() {
    let mut device = quiet_device(MockClient::online());
    assert!(block_on(device.begin("broker.local", 1883, None)));

    assert!(block_on(device.publish_sensor_data("salon", "temp", 21.456_f32)));
    assert!(block_on(device.publish_sensor_data("salon", "door", true)));
    assert!(block_on(device.publish_sensor_data("", "rssi", -67_i32)));

    let client = device.topics().client();
    assert_eq!(client.server, Some(("broker.local".into(), 1883)));
    let published: Vec<_> = client
        .published
        .iter()
        .map(|p| (p.topic.as_str(), p.text(), p.retain))
        .collect();
    assert_eq!(
        published,
        [
            ("home/salon/esp32-A1B2C3D4E5F6/temp/state", "21.46", true),
            ("home/salon/esp32-A1B2C3D4E5F6/door/state", "ON", true),
            ("home/esp32-A1B2C3D4E5F6/rssi/state", "-67", true),
        ]
    );
}

#[test]
fn long_text_values_are_published_whole() {
    let mut device = quiet_device(MockClient::online());
    assert!(block_on(device.begin("broker.local", 1883, None)));
    let status = "x".repeat(80);

    assert!(block_on(device.publish_sensor_data("salon", "status", status.as_str())));

    let published = &device.topics().client().published[0];
    assert_eq!(published.topic, "home/salon/esp32-A1B2C3D4E5F6/status/state");
    assert_eq!(published.text(), status);
    assert!(published.retain);
}

// -----------------------------------------------------------------------------
// Test 2: Discovery announcements
// -----------------------------------------------------------------------------

#[test]
fn sensor_descriptor_is_announced() {
    let mut topics = TopicManager::new(MockClient::online(), identity());
    let mut delay = NoopDelay::default();
    let mut discovery = DiscoveryAnnouncer::new(&mut topics, &mut delay);

    assert!(block_on(discovery.sensor_config(
        "salon",
        "temp",
        "temperature",
        "°C",
        "Salon temperature"
    )));

    let announced = &topics.client().published[0];
    assert_eq!(announced.topic, "homeassistant/sensor/salon_temp/config");
    assert!(announced.retain);
    assert_eq!(
        announced.text(),
        "{\"name\":\"Salon temperature\",\"device_class\":\"temperature\",\
         \"state_topic\":\"home/salon/esp32-A1B2C3D4E5F6/temp/state\",\
         \"unit_of_measurement\":\"°C\",\"unique_id\":\"esp32_A1B2C3D4E5F6_temp\"}"
    );
    assert_eq!(delay.delays_ms, [100]);
}

#[test]
fn switch_descriptor_has_command_topic() {
    let mut device = quiet_device(MockClient::online());

    assert!(block_on(device.discovery().switch_config("salon", "lamp", "Lamp")));

    let announced = &device.topics().client().published[0];
    assert_eq!(announced.topic, "homeassistant/switch/lamp/config");
    assert!(
        announced
            .text()
            .contains("\"command_topic\":\"home/salon/esp32-A1B2C3D4E5F6/lamp/set\"")
    );
    assert!(!announced.text().contains("device_class"));
}

#[test]
fn binary_sensor_descriptor() {
    let mut device = quiet_device(MockClient::online());

    assert!(block_on(device.discovery().binary_sensor_config(
        "hall",
        "motion",
        "motion",
        "Hall motion"
    )));

    let announced = &device.topics().client().published[0];
    assert_eq!(announced.topic, "homeassistant/binary_sensor/hall_motion/config");
    assert!(announced.text().contains("\"device_class\":\"motion\""));
}

#[test]
fn long_entity_names_are_not_announced() {
    let mut topics = TopicManager::new(MockClient::online(), identity());
    let mut delay = NoopDelay::default();
    let mut discovery = DiscoveryAnnouncer::new(&mut topics, &mut delay);

    for sensor in [
        "temperature_sensor_near_the_window_a",
        "temperature_sensor_near_the_window_b",
    ] {
        assert!(!block_on(discovery.sensor_config(
            "ground_floor_living_room_east_wing",
            sensor,
            "temperature",
            "°C",
            "Window temperature"
        )));
    }

    assert!(!block_on(discovery.binary_sensor_config(
        "ground_floor_living_room_east_wing",
        "motion_sensor_above_the_terrace_door",
        "motion",
        "Terrace motion"
    )));
    assert!(!block_on(discovery.switch_config("salon", &"s".repeat(110), "Lamp")));

    assert_eq!(topics.client().connects, 0);
    assert!(topics.client().published.is_empty());
    assert!(delay.delays_ms.is_empty());
}

#[test]
fn announce_gives_up_after_three_attempts() {
    let mut topics = TopicManager::new(MockClient::offline(), identity());
    let mut delay = NoopDelay::default();
    let mut discovery = DiscoveryAnnouncer::new(&mut topics, &mut delay);

    assert!(!block_on(discovery.switch_config("salon", "lamp", "Lamp")));

    assert_eq!(topics.client().connects, 3);
    assert!(topics.client().published.is_empty());
    assert_eq!(delay.delays_ms, [500, 500]);
}

#[test]
fn announce_retries_failed_publish() {
    let mut client = MockClient::online();
    client.fail_publish = true;
    let mut topics = TopicManager::new(client, identity());
    let mut delay = NoopDelay::default();
    let mut discovery = DiscoveryAnnouncer::new(&mut topics, &mut delay);

    assert!(!block_on(discovery.sensor_config(
        "salon", "hum", "humidity", "%", "Humidity"
    )));
    assert_eq!(topics.client().connects, 1);
    assert_eq!(delay.total_ms(), 1000);
}

// -----------------------------------------------------------------------------
// Test 3: Command dispatch
// -----------------------------------------------------------------------------

#[test]
fn set_command_invokes_handler() {
    let mut calls = Calls::new();
    {
        let mut device = recording_device(&mut calls);
        block_on(device.begin("broker.local", 1883, None));
        device
            .topics_mut()
            .client_mut()
            .inbound
            .push_back(("home/salon/device7/lamp/set".into(), b"ON".to_vec()));
        block_on(device.handle(Instant::from_secs(1)));
    }

    assert_eq!(calls, [("salon".to_string(), "lamp".to_string(), "ON".to_string())]);
}

#[test]
fn malformed_topics_invoke_nothing() {
    let mut calls = Calls::new();
    {
        let mut device = recording_device(&mut calls);
        block_on(device.begin("broker.local", 1883, None));
        let inbound = &mut device.topics_mut().client_mut().inbound;
        for topic in [
            "home/esp32-A1B2C3D4E5F6/lamp/set",
            "home/salon/device7/lamp",
            "office/salon/device7/lamp/set",
            "home/salon/device7/lamp/state",
            "home//device7/lamp/set",
        ] {
            inbound.push_back((topic.into(), b"ON".to_vec()));
        }
        block_on(device.handle(Instant::from_secs(1)));
    }

    assert!(calls.is_empty());
}

#[test]
fn long_payloads_are_truncated() {
    let mut calls = Calls::new();
    {
        let mut device = recording_device(&mut calls);
        block_on(device.begin("broker.local", 1883, None));
        device
            .topics_mut()
            .client_mut()
            .inbound
            .push_back(("home/salon/device7/lamp/set".into(), vec![b'7'; 500]));
        block_on(device.handle(Instant::from_secs(1)));
    }

    assert_eq!(calls[0].2.len(), 127);
}

// -----------------------------------------------------------------------------
// Test 4: Reconnect backoff
// -----------------------------------------------------------------------------

#[test]
fn reconnect_waits_for_backoff() {
    let mut device = quiet_device(MockClient::offline());
    assert!(!block_on(device.begin("broker.local", 1883, None)));
    assert_eq!(device.topics().client().connects, 1);

    let start = Instant::from_secs(100);
    block_on(device.handle(start));
    assert_eq!(device.topics().client().connects, 2);

    block_on(device.handle(start + Duration::from_secs(5)));
    block_on(device.handle(start + Duration::from_millis(9_999)));
    assert_eq!(device.topics().client().connects, 2);

    block_on(device.handle(start + Duration::from_secs(10)));
    assert_eq!(device.topics().client().connects, 3);
}

#[test]
fn connected_session_is_polled() {
    let mut device = quiet_device(MockClient::online());
    block_on(device.begin("broker.local", 1883, None));

    block_on(device.handle(Instant::from_secs(1)));
    block_on(device.handle(Instant::from_secs(2)));

    let client = device.topics().client();
    assert_eq!(client.connects, 1);
    assert_eq!(client.polls, 2);
}

#[test]
fn blocking_connect_retries_until_accepted() {
    let mut device = quiet_device(MockClient::offline());
    block_on(device.begin("broker.local", 1883, None));
    device.topics_mut().client_mut().accept_connect = true;

    block_on(device.connect_blocking());

    assert!(device.is_connected());
    assert_eq!(device.topics().client().connects, 2);
}
