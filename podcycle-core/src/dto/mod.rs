//! Data Transfer Objects
//!
//! Bodies sent to and received from pods (`/status`, `/run`) and the
//! telemetry server (`/stats`).

pub mod pod;
pub mod stats;
