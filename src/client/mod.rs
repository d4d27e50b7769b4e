//! # Telemetry Client
//!
//! Host-side consumer: keep a connection to the device alive forever,
//! reassemble newline-delimited records from whatever chunk boundaries TCP
//! produces, and hand every parsed record to the sink in arrival order.
//!
//! This module handles:
//! - Connecting with indefinite retry (policy in `retry`)
//! - Framing received bytes into lines (`wire::framing`)
//! - Dropping malformed lines without aborting the stream
//! - Treating orderly peer closure as a transient state, not an error

pub mod retry;

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sink::RecordSink;
use crate::wire::{LineFramer, SampleRecord};

pub use retry::{AttemptCounter, ReconnectPolicy};

/// Receive buffer size per read call
const READ_CHUNK_BYTES: usize = 1024;

/// Why the per-connection pump stopped
enum PumpEnd {
    /// Zero-length read or read error; reconnect
    Disconnected,
    /// Cancellation token fired; stop for good
    Cancelled,
}

/// Maintains the device connection and forwards parsed records to a sink.
pub struct TelemetryClient {
    server_addr: String,
    policy: ReconnectPolicy,
}

impl TelemetryClient {
    #[must_use]
    pub fn new(server_addr: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            server_addr: server_addr.into(),
            policy,
        }
    }

    /// Run until cancelled.
    ///
    /// Connection failures and disconnects are transient: the client backs
    /// off per its policy and tries again, indefinitely under the default
    /// policy. Two things end the run: cancellation (returns `Ok`) and a
    /// sink failure (returns the error; losing records silently is not an
    /// option).
    ///
    /// # Errors
    ///
    /// Returns the sink failure, or the last connect error if a capped
    /// policy ran out of attempts.
    pub async fn run<K: RecordSink>(
        &self,
        sink: &mut K,
        token: CancellationToken,
    ) -> Result<()> {
        let mut attempts = AttemptCounter::new(self.policy);

        loop {
            let connected = tokio::select! {
                result = TcpStream::connect(self.server_addr.as_str()) => result,
                _ = token.cancelled() => {
                    info!("client cancelled while connecting");
                    return Ok(());
                }
            };

            let stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    match attempts.record_failure() {
                        Some(delay) => {
                            warn!(
                                "connect to {} failed (attempt {}): {}; retrying in {:?}",
                                self.server_addr,
                                attempts.consecutive_failures(),
                                e,
                                delay
                            );
                            tokio::select! {
                                _ = sleep(delay) => continue,
                                _ = token.cancelled() => return Ok(()),
                            }
                        }
                        None => {
                            warn!(
                                "giving up on {} after {} attempts",
                                self.server_addr,
                                attempts.consecutive_failures()
                            );
                            return Err(e.into());
                        }
                    }
                }
            };

            attempts.record_success();
            info!("connected to {}", self.server_addr);

            match pump_stream(stream, sink, &token).await? {
                PumpEnd::Cancelled => {
                    info!("client cancelled mid-stream");
                    return Ok(());
                }
                PumpEnd::Disconnected => {
                    // Back to the connect loop; the next failure (if any)
                    // starts a fresh consecutive-failure count
                }
            }
        }
    }
}

/// Read, frame, parse, forward — one connection's worth.
///
/// Generic over the reader so tests can script arbitrary chunk boundaries.
/// Malformed lines are logged and skipped; sink errors propagate.
async fn pump_stream<R, K>(
    mut reader: R,
    sink: &mut K,
    token: &CancellationToken,
) -> Result<PumpEnd>
where
    R: AsyncRead + Unpin,
    K: RecordSink,
{
    let mut framer = LineFramer::new();
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        let read = tokio::select! {
            result = reader.read(&mut chunk) => result,
            _ = token.cancelled() => return Ok(PumpEnd::Cancelled),
        };

        let received = match read {
            // Orderly peer closure: expected, not an error
            Ok(0) => {
                info!("server closed the connection");
                return Ok(PumpEnd::Disconnected);
            }
            Ok(n) => &chunk[..n],
            Err(e) => {
                log_read_error(&e);
                return Ok(PumpEnd::Disconnected);
            }
        };

        if let Err(e) = framer.extend(received) {
            // Peer is not speaking the protocol; drop the connection
            warn!("dropping connection: {}", e);
            return Ok(PumpEnd::Disconnected);
        }

        while let Some(line) = framer.next_line() {
            match SampleRecord::parse_wire_line(&line) {
                Ok(record) => {
                    debug!("record: {:.1}s {:.4}", record.elapsed_s, record.value);
                    sink.append(&record)?;
                }
                Err(e) => {
                    // One bad line never aborts the stream
                    warn!("skipping line: {}", e);
                }
            }
        }
    }
}

fn log_read_error(e: &io::Error) {
    match e.kind() {
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            info!("connection dropped by peer: {}", e);
        }
        _ => {
            warn!("read failed: {}", e);
        }
    }
}

/// Convenience for building the baseline policy from config
#[must_use]
pub fn policy_from_delay_ms(reconnect_delay_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy::fixed(Duration::from_millis(reconnect_delay_ms))
}
