use core::cell::Cell;
use core::sync::atomic::Ordering;

use embassy_futures::select::{Either, select};
use embassy_net::{IpAddress, Ipv4Address, Stack, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::with_timeout;
use heapless::{String, Vec};
use myrtio_mqtt::client::{MqttClient, MqttEvent, MqttOptions};
use myrtio_mqtt::packet::{Publish, QoS};
use myrtio_mqtt::transport::TcpTransport;

use crate::config::MQTT;
use crate::infrastructure::drivers::mqtt_client::{
    INBOUND_MESSAGES,
    InboundMessage,
    MqttError,
    PACKET_BUFFER_SIZE,
    PAYLOAD_SIZE,
    SESSION_REPLIES,
    SESSION_REQUESTS,
    SESSION_UP,
    SessionRequest,
    SessionTarget,
    TOPIC_SIZE,
};
use crate::infrastructure::drivers::mqtt_transport::SessionTransport;

const SOCKET_BUFFER_SIZE: usize = 1024;
const MAX_TOPICS: usize = 4;

/// Broker session task.
///
/// Waits for a connect request, then serves subscribe and publish requests
/// and forwards inbound messages until the session drops.
#[embassy_executor::task]
pub(crate) async fn mqtt_session_task(stack: Stack<'static>, client_id: &'static str) {
    let mut rx_buffer = [0u8; SOCKET_BUFFER_SIZE];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_SIZE];
    let mut next_target = None;

    loop {
        let target = match next_target.take() {
            Some(target) => target,
            None => match SESSION_REQUESTS.receive().await {
                SessionRequest::Connect(target) => target,
                SessionRequest::Subscribe(_) | SessionRequest::Publish(_) => {
                    reply(Err(MqttError::NotConnected));
                    continue;
                }
            },
        };

        next_target = run_session(stack, client_id, &target, &mut rx_buffer, &mut tx_buffer).await;
        SESSION_UP.store(false, Ordering::Relaxed);
        log::info!("mqtt: session closed");
    }
}

/// Serve one broker session.
///
/// Returns the next target when a connect request arrives while the session
/// is up.
async fn run_session(
    stack: Stack<'static>,
    client_id: &'static str,
    target: &SessionTarget,
    rx_buffer: &mut [u8],
    tx_buffer: &mut [u8],
) -> Option<SessionTarget> {
    let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
    socket.set_timeout(Some(MQTT.keep_alive * 2));

    let address = match resolve_host(stack, &target.host).await {
        Ok(address) => address,
        Err(e) => {
            reply(Err(e));
            return None;
        }
    };

    match with_timeout(MQTT.connect_timeout, socket.connect((address, target.port))).await {
        Ok(Ok(())) => log::info!("mqtt: TCP socket connected to {:?}", address),
        Ok(Err(e)) => {
            log::warn!("mqtt: TCP connect failed: {:?}", e);
            socket.abort();
            reply(Err(MqttError::Connect));
            return None;
        }
        Err(_) => {
            socket.abort();
            reply(Err(MqttError::Timeout));
            return None;
        }
    }

    let retain = Cell::new(false);
    let transport = SessionTransport::new(
        TcpTransport::new(socket, MQTT.keep_alive * 2),
        target.login.as_ref(),
        &retain,
    );
    let options = MqttOptions::new(client_id).with_keep_alive(MQTT.keep_alive);
    let mut client: MqttClient<_, MAX_TOPICS, PACKET_BUFFER_SIZE> =
        MqttClient::new(transport, options);

    if let Err(e) = client.connect().await {
        log::warn!("mqtt: broker refused the session: {:?}", e);
        reply(Err(MqttError::Session));
        return None;
    }
    SESSION_UP.store(true, Ordering::Relaxed);
    reply(Ok(()));

    loop {
        let request = match select(SESSION_REQUESTS.receive(), client.poll()).await {
            Either::First(request) => request,
            Either::Second(Ok(Some(MqttEvent::Publish(publish)))) => {
                forward_inbound(&publish);
                continue;
            }
            Either::Second(Ok(_)) => continue,
            Either::Second(Err(e)) => {
                log::warn!("mqtt: session lost: {:?}", e);
                return None;
            }
        };

        let result = match request {
            SessionRequest::Connect(next) => return Some(next),
            SessionRequest::Subscribe(filter) => {
                client.subscribe(&filter, QoS::AtMostOnce).await
            }
            SessionRequest::Publish(message) => {
                retain.set(message.retain);
                let result = client
                    .publish(&message.topic, &message.payload, QoS::AtMostOnce)
                    .await;
                retain.set(false);
                result
            }
        };

        if let Err(e) = result {
            log::warn!("mqtt: request failed: {:?}", e);
            reply(Err(MqttError::Session));
            return None;
        }
        reply(Ok(()));
    }
}

/// Hand the reply to the waiting handle, replacing a stale one
fn reply(result: Result<(), MqttError>) {
    let _ = SESSION_REPLIES.try_receive();
    let _ = SESSION_REPLIES.try_send(result);
}

fn forward_inbound(publish: &Publish<'_>) {
    let (Ok(topic), Ok(payload)) = (
        String::<TOPIC_SIZE>::try_from(publish.topic),
        Vec::<u8, PAYLOAD_SIZE>::from_slice(publish.payload),
    ) else {
        log::warn!("mqtt: dropped oversized message on {}", publish.topic);
        return;
    };
    if INBOUND_MESSAGES.try_send(InboundMessage { topic, payload }).is_err() {
        log::warn!("mqtt: inbound queue full, dropped message on {}", publish.topic);
    }
}

/// Resolve a broker host name or dotted address
async fn resolve_host(stack: Stack<'static>, host: &str) -> Result<IpAddress, MqttError> {
    if let Ok(ip) = host.parse::<Ipv4Address>() {
        return Ok(IpAddress::Ipv4(ip));
    }

    let addresses = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|e| {
            log::warn!("mqtt: failed to resolve '{}': {:?}", host, e);
            MqttError::Resolve
        })?;
    addresses.first().copied().ok_or(MqttError::Resolve)
}
