//! # VBatt Link Library
//!
//! Stream battery-voltage telemetry from a small device to a host over TCP.
//!
//! This library provides both halves of the pipeline: the device-side
//! sampler/server that emits one line-delimited reading per interval, and the
//! host-side client that reassembles records from the byte stream and appends
//! them to a durable CSV log.

pub mod config;
pub mod error;
pub mod wire;
pub mod device;
pub mod server;
pub mod client;
pub mod sink;
