//! Application core — pure domain logic, zero I/O.
//!
//! The business rules of the sensor node: channel selection, the retry
//! queue, peer command parsing, runtime configuration and threshold alerts.
//! All interaction with hardware and radios happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable on the host.

pub mod alerts;
pub mod commands;
pub mod events;
pub mod ports;
pub mod retry_queue;
pub mod runtime_config;
pub mod service;
