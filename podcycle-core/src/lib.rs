//! Podcycle Core
//!
//! Core types shared by the pod lifecycle manager, its HTTP clients and the CLI.
//!
//! This crate contains:
//! - Domain types: cycle phases, pod references, pod counts, stats snapshots
//! - DTOs: request/response bodies exchanged with pods and the telemetry server

pub mod domain;
pub mod dto;
