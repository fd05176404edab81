//! Protocol codecs of the provisioning portal

pub mod dhcp;
pub mod dns;
pub mod http;
