//! Solar Charge Optimizer
//!
//! Diverts surplus rooftop-solar generation into an electric vehicle by
//! starting, stopping and re-throttling its charge from a periodic control
//! loop, with a small HTTP API for the current state and the manual
//! force-charge override.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod hardware;
pub mod logging;
pub mod repo;
pub mod telemetry;
