use core::fmt::Debug;

use crate::domain::entity::Credentials;

/// Publish/subscribe transport (an MQTT client session).
///
/// The wire protocol is up to the implementation. Only QoS 0 semantics are
/// expected.
#[allow(async_fn_in_trait)]
pub trait PubSubClient {
    type Error: Debug;

    /// Set the broker address used by the next [`PubSubClient::connect`]
    fn set_server(&mut self, host: &str, port: u16);

    fn is_connected(&self) -> bool;

    /// Open a session with the broker
    async fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error>;

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), Self::Error>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Service the session once.
    ///
    /// Inbound messages are delivered synchronously to `on_message`.
    async fn poll(
        &mut self,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<(), Self::Error>;
}
