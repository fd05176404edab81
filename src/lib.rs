//! Core of a WiFi smart-home node.
//!
//! Bridges sensors and actuators to an MQTT broker, announces them to Home
//! Assistant, and falls back to a captive provisioning portal when the node
//! has no working network configuration. Hardware access goes through the
//! port traits in [`domain::ports`].

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod config;
pub mod controllers;
pub mod core;
pub mod domain;
pub mod infrastructure;
