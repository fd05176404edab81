//! Infrastructure layer - port implementations that need no hardware

pub mod repositories;
