//! # Telemetry Server
//!
//! Device-side streaming server: accept one client, warm up the analog
//! front-end, then emit one wire line per interval until the client goes
//! away, and go back to listening.
//!
//! Per session the state machine is
//! `LISTEN → ACCEPTED → WARMUP → STREAMING → CLOSED → LISTEN`.
//!
//! Sessions are strictly serialized by construction: the accept loop awaits
//! the whole session before it calls `accept` again, so a second client
//! stays queued in the kernel backlog until the active session ends.
//! Concurrent sessions are intentionally unsupported, not an accident of
//! blocking calls.

use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::device::sampler::SensorSampler;
use crate::device::{Sensor, StatusLed};
use crate::error::Result;
use crate::wire::SampleRecord;

/// How one session ended; only affects logging
enum SessionEnd {
    PeerClosed,
    Cancelled,
}

/// Streams calibrated samples to one client at a time.
pub struct TelemetryServer<S: Sensor, L: StatusLed> {
    sampler: SensorSampler<S>,
    led: L,
    config: DeviceConfig,
}

impl<S: Sensor, L: StatusLed> TelemetryServer<S, L> {
    #[must_use]
    pub fn new(sampler: SensorSampler<S>, led: L, config: DeviceConfig) -> Self {
        Self {
            sampler,
            led,
            config,
        }
    }

    /// Serve sessions until cancelled.
    ///
    /// Per-session socket errors recycle to the accept state. Two things are
    /// fatal and propagate: a failure of the listener itself (restart belongs
    /// to the external supervisor) and a sensor read failure (a dead
    /// front-end is not session-scoped).
    ///
    /// # Errors
    ///
    /// Returns the listener or sensor failure that stopped the server.
    pub async fn run(&mut self, listener: TcpListener, token: CancellationToken) -> Result<()> {
        info!("listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = token.cancelled() => {
                    info!("server cancelled while listening");
                    return Ok(());
                }
            };

            info!("client connected: {}", addr);
            match self.handle_session(stream, &token).await? {
                SessionEnd::Cancelled => {
                    info!("server cancelled mid-session");
                    return Ok(());
                }
                SessionEnd::PeerClosed => {
                    info!("client closed; waiting for next connection");
                }
            }
        }
    }

    /// Run one session to completion: warmup, then stream until the socket
    /// errors or the token fires. The session's time origin is re-based to
    /// the moment of accept.
    async fn handle_session(
        &mut self,
        mut stream: TcpStream,
        token: &CancellationToken,
    ) -> Result<SessionEnd> {
        let t0 = Instant::now();

        // WARMUP: let the front-end settle, then burn the first reads
        tokio::select! {
            _ = sleep(Duration::from_millis(self.config.settle_ms)) => {}
            _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
        }
        for _ in 0..self.config.discard_samples {
            self.sampler.discard_one()?;
            tokio::select! {
                _ = sleep(Duration::from_millis(self.config.discard_spacing_ms)) => {}
                _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
            }
        }
        debug!("warmup complete, streaming");

        // STREAMING
        loop {
            // Elapsed is stamped after the averaging reads, at send time
            let value = self.sampler.sample()?;
            let elapsed_s = t0.elapsed().as_secs_f64();
            let record = SampleRecord::new(elapsed_s, value);
            let line = record.to_wire_line();

            // Backpressure policy is to block: if the host stalls, this
            // write waits for the send buffer rather than dropping records
            let written = tokio::select! {
                res = stream.write_all(line.as_bytes()) => res,
                _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
            };
            if let Err(e) = written {
                log_session_error(&e);
                return Ok(SessionEnd::PeerClosed);
            }
            if let Err(e) = stream.flush().await {
                log_session_error(&e);
                return Ok(SessionEnd::PeerClosed);
            }
            debug!("sent record: {}", line.trim_end());

            // Heartbeat blink; observational only
            self.led.set(true);
            sleep(Duration::from_millis(self.config.heartbeat_blink_ms)).await;
            self.led.set(false);

            tokio::select! {
                _ = sleep(Duration::from_millis(self.config.sample_interval_ms)) => {}
                _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
            }
        }
    }
}

/// Orderly teardown logs at info; anything else is a real fault and logs at
/// warn so it is not masked.
fn log_session_error(e: &io::Error) {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => {
            info!("session closed by peer: {}", e);
        }
        _ => {
            warn!("session failed unexpectedly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use crate::device::mocks::{MockLed, MockSensor};
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn fast_config() -> DeviceConfig {
        DeviceConfig {
            listen_port: 0,
            settle_ms: 0,
            discard_samples: 2,
            discard_spacing_ms: 0,
            sample_interval_ms: 5,
            sample_count: 4,
            heartbeat_blink_ms: 0,
        }
    }

    fn spawn_server<S: Sensor + 'static>(
        sensor: S,
        led: MockLed,
        config: DeviceConfig,
        token: CancellationToken,
    ) -> (std::net::SocketAddr, tokio::task::JoinHandle<Result<()>>) {
        let sampler = SensorSampler::new(sensor, CalibrationConfig::default(), config.sample_count);
        let mut server = TelemetryServer::new(sampler, led, config);

        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let addr = std_listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let listener = TcpListener::from_std(std_listener)?;
            server.run(listener, token).await
        });
        (addr, handle)
    }

    async fn read_one_record(addr: std::net::SocketAddr) -> SampleRecord {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        SampleRecord::parse_wire_line(line.trim_end().as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_streams_parseable_records() {
        let token = CancellationToken::new();
        let (addr, handle) =
            spawn_server(MockSensor::steady(2048 << 4), MockLed::new(), fast_config(), token.clone());

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut records = Vec::new();
        for _ in 0..3 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            records.push(SampleRecord::parse_wire_line(line.trim_end().as_bytes()).unwrap());
        }

        // Elapsed times move forward; values come from the steady mock
        assert!(records[0].elapsed_s <= records[1].elapsed_s);
        assert!(records[1].elapsed_s <= records[2].elapsed_s);
        let expected = 2048.0 * (3.3 / 4095.0) * 3.0;
        for record in &records {
            assert!((record.value - expected).abs() < 0.001);
        }

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_warmup_discards_before_streaming() {
        let sensor = MockSensor::steady(2048 << 4);
        let probe = sensor.clone();
        let token = CancellationToken::new();
        let (addr, handle) = spawn_server(sensor, MockLed::new(), fast_config(), token.clone());

        let _ = read_one_record(addr).await;

        // 2 discarded reads plus one 4-read averaged sample, at minimum
        assert!(probe.reads() >= 2 + 4, "only {} reads", probe.reads());

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_session_rebases_elapsed_time() {
        let token = CancellationToken::new();
        let (addr, handle) =
            spawn_server(MockSensor::steady(2048 << 4), MockLed::new(), fast_config(), token.clone());

        // First client reads a few records then drops mid-stream
        {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut reader = BufReader::new(stream);
            for _ in 0..3 {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
            }
        }

        // Server must survive the disconnect and re-base the next session
        let first = read_one_record(addr).await;
        assert!(
            first.elapsed_s < 1.0,
            "second session did not re-base: elapsed {}",
            first.elapsed_s
        );

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_client_waits_for_active_session() {
        let token = CancellationToken::new();
        let (addr, handle) =
            spawn_server(MockSensor::steady(2048 << 4), MockLed::new(), fast_config(), token.clone());

        // Client A occupies the only session
        let stream_a = TcpStream::connect(addr).await.unwrap();
        let mut reader_a = BufReader::new(stream_a);
        let mut line_a = String::new();
        reader_a.read_line(&mut line_a).await.unwrap();

        // Client B's handshake completes via the kernel backlog, but the
        // server must not serve it while A's session is live
        let stream_b = TcpStream::connect(addr).await.unwrap();
        let mut reader_b = BufReader::new(stream_b);
        let mut line_b = String::new();
        let starved = tokio::time::timeout(
            Duration::from_millis(100),
            reader_b.read_line(&mut line_b),
        )
        .await;
        assert!(
            starved.is_err(),
            "second client received data mid-session: {:?}",
            line_b
        );

        // A drops; the server notices on a subsequent write and accepts B
        drop(reader_a);
        line_b.clear();
        reader_b.read_line(&mut line_b).await.unwrap();
        let first = SampleRecord::parse_wire_line(line_b.trim_end().as_bytes()).unwrap();
        assert!(
            first.elapsed_s < 1.0,
            "second session not re-based: elapsed {}",
            first.elapsed_s
        );

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    /// Sensor whose every read takes long enough to show up in the elapsed
    /// stamp at wire precision
    struct SlowSensor;

    impl Sensor for SlowSensor {
        fn read_raw(&mut self) -> Result<u16> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(2048 << 4)
        }
    }

    #[tokio::test]
    async fn test_elapsed_stamped_after_sampling() {
        let mut config = fast_config();
        config.discard_samples = 0;
        config.sample_count = 4;
        let token = CancellationToken::new();
        let (addr, handle) = spawn_server(SlowSensor, MockLed::new(), config, token.clone());

        // Four 50ms reads put the first send ~200ms into the session; the
        // record's stamp must reflect the send time, not the loop entry
        let first = read_one_record(addr).await;
        assert!(
            first.elapsed_s >= 0.2,
            "elapsed {} predates the averaging reads",
            first.elapsed_s
        );

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_blinks_per_record() {
        let led = MockLed::new();
        let probe = led.clone();
        let token = CancellationToken::new();
        let (addr, handle) =
            spawn_server(MockSensor::steady(2048 << 4), led, fast_config(), token.clone());

        let _ = read_one_record(addr).await;

        token.cancel();
        handle.await.unwrap().unwrap();

        let history = probe.history();
        assert!(!history.is_empty(), "heartbeat never blinked");
        assert_eq!(history[0], true);
        // Transitions strictly alternate on/off
        for pair in history.chunks(2) {
            if pair.len() == 2 {
                assert_eq!(pair[0], true);
                assert_eq!(pair[1], false);
            }
        }
    }

    #[tokio::test]
    async fn test_sensor_failure_is_fatal() {
        let sensor = MockSensor::steady(2048 << 4);
        sensor.set_fail_after(10);
        let token = CancellationToken::new();
        let (addr, handle) = spawn_server(sensor, MockLed::new(), fast_config(), token.clone());

        // Hold the connection open; the server dies once reads start failing
        let _stream = TcpStream::connect(addr).await.unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_err(), "sensor failure should stop the server");
    }

    #[tokio::test]
    async fn test_cancel_while_listening_returns_clean() {
        let token = CancellationToken::new();
        let (_addr, handle) =
            spawn_server(MockSensor::steady(0), MockLed::new(), fast_config(), token.clone());

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
