//! Stateless DHCP responder for the provisioning access point
//!
//! Every client gets an address derived from its MAC inside the access point's
//! /24, with the access point itself as router and DNS server.

use core::net::Ipv4Addr;

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;

pub const DHCP_DISCOVER: u8 = 1;
pub const DHCP_OFFER: u8 = 2;
pub const DHCP_REQUEST: u8 = 3;
pub const DHCP_ACK: u8 = 5;

const OPTION_PAD: u8 = 0;
const OPTION_SUBNET_MASK: u8 = 1;
const OPTION_ROUTER: u8 = 3;
const OPTION_DNS: u8 = 6;
const OPTION_LEASE_TIME: u8 = 51;
const OPTION_MESSAGE_TYPE: u8 = 53;
const OPTION_SERVER_ID: u8 = 54;
const OPTION_END: u8 = 255;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const LEASE_TIME_SECS: u32 = 3600;
const SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// BOOTP header plus magic cookie
const OPTIONS_OFFSET: usize = 240;
/// Bytes written after the cookie by [`build_response`]
const RESPONSE_OPTIONS_LEN: usize = 3 + 6 * 5 + 1;
pub const RESPONSE_SIZE: usize = OPTIONS_OFFSET + RESPONSE_OPTIONS_LEN;

/// First host number handed out, the access point being `.1`
const FIRST_HOST: u8 = 2;
const HOST_COUNT: u8 = 49;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpRequest {
    pub xid: [u8; 4],
    pub client_mac: [u8; 6],
    pub message_type: u8,
}

/// Parse a BOOTREQUEST carrying a message type option
pub fn parse_request(packet: &[u8]) -> Option<DhcpRequest> {
    if packet.len() < OPTIONS_OFFSET || packet[0] != 1 {
        return None;
    }
    if packet[236..OPTIONS_OFFSET] != MAGIC_COOKIE {
        return None;
    }

    let mut xid = [0u8; 4];
    xid.copy_from_slice(&packet[4..8]);
    let mut client_mac = [0u8; 6];
    client_mac.copy_from_slice(&packet[28..34]);

    let message_type = find_option(&packet[OPTIONS_OFFSET..], OPTION_MESSAGE_TYPE)
        .and_then(|data| data.first().copied())?;

    Some(DhcpRequest {
        xid,
        client_mac,
        message_type,
    })
}

/// Reply type for a request, if the request is one the server answers
pub fn reply_type(request: &DhcpRequest) -> Option<u8> {
    match request.message_type {
        DHCP_DISCOVER => Some(DHCP_OFFER),
        DHCP_REQUEST => Some(DHCP_ACK),
        _ => None,
    }
}

/// Address for a client, stable across requests of the same MAC
pub fn allocate_ip(server: Ipv4Addr, mac: &[u8; 6]) -> Ipv4Addr {
    let [a, b, c, _] = server.octets();
    Ipv4Addr::new(a, b, c, mac[5] % HOST_COUNT + FIRST_HOST)
}

/// Write an OFFER or ACK into `buffer`.
///
/// Returns the packet length, or `None` when `buffer` is shorter than
/// [`RESPONSE_SIZE`].
pub fn build_response(
    server: Ipv4Addr,
    request: &DhcpRequest,
    offered: Ipv4Addr,
    response_type: u8,
    buffer: &mut [u8],
) -> Option<usize> {
    let buffer = buffer.get_mut(..RESPONSE_SIZE)?;
    buffer.fill(0);

    // BOOTREPLY over Ethernet
    buffer[0] = 2;
    buffer[1] = 1;
    buffer[2] = 6;
    buffer[4..8].copy_from_slice(&request.xid);
    // Broadcast flag
    buffer[10] = 0x80;
    buffer[16..20].copy_from_slice(&offered.octets());
    buffer[20..24].copy_from_slice(&server.octets());
    buffer[28..34].copy_from_slice(&request.client_mac);
    buffer[236..OPTIONS_OFFSET].copy_from_slice(&MAGIC_COOKIE);

    let mut options = OptionWriter {
        buf: &mut buffer[OPTIONS_OFFSET..],
        pos: 0,
    };
    options.put(OPTION_MESSAGE_TYPE, &[response_type]);
    options.put(OPTION_SERVER_ID, &server.octets());
    options.put(OPTION_LEASE_TIME, &LEASE_TIME_SECS.to_be_bytes());
    options.put(OPTION_SUBNET_MASK, &SUBNET_MASK.octets());
    options.put(OPTION_ROUTER, &server.octets());
    options.put(OPTION_DNS, &server.octets());
    options.buf[options.pos] = OPTION_END;

    Some(OPTIONS_OFFSET + options.pos + 1)
}

struct OptionWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl OptionWriter<'_> {
    #[allow(clippy::cast_possible_truncation)]
    fn put(&mut self, code: u8, data: &[u8]) {
        self.buf[self.pos] = code;
        self.buf[self.pos + 1] = data.len() as u8;
        self.buf[self.pos + 2..self.pos + 2 + data.len()].copy_from_slice(data);
        self.pos += 2 + data.len();
    }
}

/// Options section lookup, `options` starting after the magic cookie
fn find_option(options: &[u8], code: u8) -> Option<&[u8]> {
    let mut i = 0;
    while let Some(&current) = options.get(i) {
        match current {
            OPTION_END => break,
            OPTION_PAD => i += 1,
            _ => {
                let len = usize::from(*options.get(i + 1)?);
                let data = options.get(i + 2..i + 2 + len)?;
                if current == code {
                    return Some(data);
                }
                i += 2 + len;
            }
        }
    }
    None
}
