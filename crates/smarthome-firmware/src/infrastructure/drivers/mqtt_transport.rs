//! TCP transport of the broker session
//!
//! `myrtio_mqtt` connects without a login and publishes without the retain
//! flag. This transport patches both into the packets on their way out.

use core::cell::Cell;

use embassy_net::tcp;
use myrtio_mqtt::error::MqttError;
use myrtio_mqtt::transport::{MqttTransport, TcpTransport};
use myrtio_mqtt::util::{read_variable_byte_integer, write_utf8_string, write_variable_byte_integer_len};
use smarthome_node::config::MAX_FIELD_LEN;

use super::mqtt_client::{Login, PACKET_BUFFER_SIZE};

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;

const RETAIN_FLAG: u8 = 0x01;
const USERNAME_FLAG: u8 = 0x80;
const PASSWORD_FLAG: u8 = 0x40;

pub(crate) struct SessionTransport<'a> {
    inner: TcpTransport<'a>,
    login: Option<&'a Login>,
    /// Retain flag of the next PUBLISH
    retain: &'a Cell<bool>,
    frame: [u8; PACKET_BUFFER_SIZE],
}

impl<'a> SessionTransport<'a> {
    pub(crate) fn new(
        inner: TcpTransport<'a>,
        login: Option<&'a Login>,
        retain: &'a Cell<bool>,
    ) -> Self {
        Self {
            inner,
            login,
            retain,
            frame: [0; PACKET_BUFFER_SIZE],
        }
    }
}

impl MqttTransport for SessionTransport<'_> {
    type Error = MqttError<tcp::Error>;

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        let packet_type = buf.first().map(|header| header >> 4);

        if packet_type == Some(CONNECT)
            && let Some(login) = self.login
        {
            let len = with_login(buf, login, &mut self.frame).ok_or(MqttError::BufferTooSmall)?;
            return self.inner.send(&self.frame[..len]).await;
        }

        if packet_type == Some(PUBLISH) && self.retain.get() {
            let frame = self
                .frame
                .get_mut(..buf.len())
                .ok_or(MqttError::BufferTooSmall)?;
            frame.copy_from_slice(buf);
            frame[0] |= RETAIN_FLAG;
            return self.inner.send(frame).await;
        }

        self.inner.send(buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.inner.recv(buf).await
    }
}

/// Re-encode a CONNECT packet into `out` with a username and a password.
///
/// Returns the length of the new packet.
fn with_login(packet: &[u8], login: &Login, out: &mut [u8]) -> Option<usize> {
    let header = *packet.first()?;
    let mut cursor = 1;
    let remaining = read_variable_byte_integer(&mut cursor, packet).ok()?;
    let body = packet.get(cursor..cursor + remaining)?;

    // Protocol name and level precede the flags
    let name_len = usize::from(u16::from_be_bytes([*body.first()?, *body.get(1)?]));
    let flags_at = 2 + name_len + 1;

    let mut login_fields = [0u8; 2 * (MAX_FIELD_LEN + 2)];
    let mut login_len = write_utf8_string(&mut login_fields, &login.username).ok()?;
    login_len += write_utf8_string(&mut login_fields[login_len..], &login.password).ok()?;

    *out.first_mut()? = header;
    let header_len = 1 + write_variable_byte_integer_len(out.get_mut(1..)?, remaining + login_len).ok()?;
    let end = header_len + remaining + login_len;
    let rewritten = out.get_mut(header_len..end)?;
    rewritten[..remaining].copy_from_slice(body);
    rewritten[remaining..].copy_from_slice(&login_fields[..login_len]);
    *rewritten.get_mut(flags_at)? |= USERNAME_FLAG | PASSWORD_FLAG;
    Some(end)
}
