//! Monthly electricity bill calculation for MEA and PEA tariffs.

pub mod api;
pub mod config;
pub mod domain;
pub mod state;
pub mod tariff;
pub mod telemetry;
