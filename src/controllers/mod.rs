//! Inbound adapters

pub mod portal;
