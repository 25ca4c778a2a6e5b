//! Network receive loop
//!
//! Binds one endpoint and polls it forever: one receive per iteration,
//! then a cooperative yield. Every `report_interval_ms` an uptime line
//! goes to the line sink. Only the cancellation token ends the loop.

use core::fmt::{self, Write};

use heapless::String as HeaplessString;
use log::{error, info};

use crate::collab::{Clock, LineSink, Transport, Yield};
use crate::config::NetConfig;
use crate::coord::CancelToken;
use crate::dispatch::{Runnable, WorkloadContext, WorkloadKind};
use crate::error::WorkloadError;

/// Largest datagram accepted (Ethernet frame)
pub const FRAME_BUFFER_SIZE: usize = 1600;

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub iterations: u64,
    pub datagrams: u64,
    pub bytes: u64,
    pub errors: u64,
}

/// Receive loop over a transport endpoint
pub struct ReceiveLoop<T, Y, C, S> {
    transport: T,
    yielder: Y,
    clock: C,
    sink: S,
    config: NetConfig,
    buf: [u8; FRAME_BUFFER_SIZE],
    stats: ReceiveStats,
}

impl<T, Y, C, S> ReceiveLoop<T, Y, C, S>
where
    T: Transport,
    Y: Yield,
    C: Clock,
    S: LineSink,
{
    pub fn new(transport: T, yielder: Y, clock: C, sink: S, config: NetConfig) -> Self {
        Self {
            transport,
            yielder,
            clock,
            sink,
            config,
            buf: [0; FRAME_BUFFER_SIZE],
            stats: ReceiveStats::default(),
        }
    }

    /// Counters of the last run
    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn yielder(&self) -> &Y {
        &self.yielder
    }

    /// Bind, then poll until `cancel` is set
    pub fn run_until_cancelled(&mut self, cancel: &CancelToken) -> Result<ReceiveStats, WorkloadError> {
        let port = self.config.port;
        self.stats = ReceiveStats::default();

        if let Err(code) = self.transport.bind(port) {
            error!(target: "network", "Cannot bind to port {}", port);
            return Err(WorkloadError::Bind { port, code });
        }
        info!(target: "network", "listening on port {}", port);

        let start = self.clock.millis();
        let mut next_report = start;

        while !cancel.is_cancelled() {
            self.stats.iterations += 1;

            match self.transport.receive(&mut self.buf) {
                Err(code) => {
                    self.stats.errors += 1;
                    error!(target: "network", "Socket error {}", code);
                }
                Ok(0) => {}
                Ok(n) => {
                    let n = n.min(FRAME_BUFFER_SIZE);
                    self.stats.datagrams += 1;
                    self.stats.bytes += n as u64;
                    info!(target: "network", "Socket data: {}", Lossy(&self.buf[..n]));
                }
            }

            let now = self.clock.millis();
            if now >= next_report {
                self.sink.write_line(&uptime_line(now.saturating_sub(start)));
                next_report = now + self.config.report_interval_ms.max(1);
            }

            self.yielder.yield_now();
        }

        Ok(self.stats)
    }
}

impl<T, Y, C, S> Runnable for ReceiveLoop<T, Y, C, S>
where
    T: Transport + Send,
    Y: Yield + Send,
    C: Clock + Send,
    S: LineSink + Send,
{
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::NetworkReceive
    }

    fn run(&mut self, ctx: &WorkloadContext<'_>) -> Result<(), WorkloadError> {
        let stats = self.run_until_cancelled(ctx.cancel)?;
        info!(
            target: "network",
            "stopped after {} iterations: {} datagrams, {} bytes, {} errors",
            stats.iterations, stats.datagrams, stats.bytes, stats.errors
        );
        Ok(())
    }
}

/// `HH:MM:SS` of an elapsed time
pub fn uptime_line(elapsed_ms: u64) -> HeaplessString<24> {
    let secs = elapsed_ms / 1000;
    let mut line = HeaplessString::new();
    // u64 hours need at most 16 digits.
    let _ = write!(line, "{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    line
}

/// Datagram payload as text: up to the first NUL, invalid UTF-8 replaced
struct Lossy<'a>(&'a [u8]);

impl fmt::Display for Lossy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        for chunk in self.0[..end].utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_char(char::REPLACEMENT_CHARACTER)?;
            }
        }
        Ok(())
    }
}
