//! # Wire Protocol Module
//!
//! The telemetry wire format: one ASCII record per line, no handshake, no
//! length prefix, no acknowledgement.
//!
//! This module handles:
//! - Formatting records for the socket (`record`)
//! - Parsing received lines back into records (`record`)
//! - Reassembling complete lines from arbitrarily-chunked TCP reads (`framing`)

pub mod record;
pub mod framing;

pub use framing::LineFramer;
pub use record::SampleRecord;
