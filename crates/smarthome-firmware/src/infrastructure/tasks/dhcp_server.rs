//! DHCP server of the provisioning access point

use core::net::Ipv4Addr;

use embassy_net::{
    Stack,
    udp::{PacketMetadata, UdpSocket},
};
use smarthome_node::core::net::dhcp;

const PACKET_SLOTS: usize = 8;
const SOCKET_BUFFER_SIZE: usize = 1024;
const PACKET_SIZE: usize = 576;

/// Answer DISCOVER and REQUEST messages with addresses derived from the
/// client MAC
#[embassy_executor::task]
pub(crate) async fn dhcp_server_task(stack: Stack<'static>, server: Ipv4Addr) {
    let mut rx_meta = [PacketMetadata::EMPTY; PACKET_SLOTS];
    let mut rx_buffer = [0u8; SOCKET_BUFFER_SIZE];
    let mut tx_meta = [PacketMetadata::EMPTY; PACKET_SLOTS];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_SIZE];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    if let Err(e) = socket.bind(dhcp::SERVER_PORT) {
        log::error!("dhcp: failed to bind port {}: {:?}", dhcp::SERVER_PORT, e);
        return;
    }
    log::info!("dhcp: serving {}/24", server);

    let mut packet = [0u8; PACKET_SIZE];
    loop {
        let len = match socket.recv_from(&mut packet).await {
            Ok((len, _)) => len,
            Err(e) => {
                log::debug!("dhcp: receive failed: {:?}", e);
                continue;
            }
        };

        let Some(request) = dhcp::parse_request(&packet[..len]) else {
            continue;
        };
        let Some(reply_type) = dhcp::reply_type(&request) else {
            log::debug!("dhcp: ignoring message type {}", request.message_type);
            continue;
        };

        let offered = dhcp::allocate_ip(server, &request.client_mac);
        let Some(reply_len) =
            dhcp::build_response(server, &request, offered, reply_type, &mut packet)
        else {
            continue;
        };
        log::debug!("dhcp: offering {} (type {})", offered, reply_type);

        let destination = (Ipv4Addr::BROADCAST, dhcp::CLIENT_PORT);
        if let Err(e) = socket.send_to(&packet[..reply_len], destination).await {
            log::warn!("dhcp: send failed: {:?}", e);
        }
    }
}
