mod dhcp_server;
mod mqtt_session;
mod network;

pub(crate) use dhcp_server::dhcp_server_task;
pub(crate) use mqtt_session::mqtt_session_task;
pub(crate) use network::network_runner_task;
