//! Core domain types
//!
//! These types describe the hourly pod cycle and the telemetry it publishes.
//! They are shared between the manager (which drives the cycle) and the
//! clients that talk to pods and to the telemetry server.

pub mod phase;
pub mod pod;
pub mod stats;
