//! Collaborator services consumed by the workloads
//!
//! Screen, serial, network stack and scheduler are provided by the
//! platform. The core only needs these four narrow calls.

/// Text output (screen or serial)
pub trait LineSink {
    /// Write one line; the sink supplies the line terminator
    fn write_line(&mut self, line: &str);
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line)
    }
}

/// Byte-stream receive endpoint
pub trait Transport {
    /// Bind the endpoint to a port. `Err` carries the stack's negative error code
    fn bind(&mut self, port: u16) -> Result<(), i32>;

    /// Receive up to `buf.len()` bytes without blocking
    ///
    /// `Ok(0)` means nothing was pending. `Err` carries the stack's negative
    /// error code.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, i32>;
}

/// Cooperative yield to other ready work on the same core
pub trait Yield {
    fn yield_now(&mut self);
}

/// Monotonic millisecond clock
pub trait Clock {
    fn millis(&self) -> u64;
}

/// Yield that only hints the pipeline; for cores with nothing else to run
pub struct SpinYield;

impl Yield for SpinYield {
    #[inline]
    fn yield_now(&mut self) {
        core::hint::spin_loop();
    }
}
