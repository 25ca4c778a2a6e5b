//! Kernel log presentation
//!
//! Records go through the `log` facade. [`LineLogger`] renders each one
//! into a bounded line and hands it to a [`LineSink`], one core at a time.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};

use heapless::String as HeaplessString;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::collab::LineSink;

/// Longest rendered log line; longer records are cut
pub const MAX_LINE_LEN: usize = 160;

/// Map a command-line `loglevel=` value to a facade filter
///
/// 0 panic, 1 error, 2 warning, 3 notice, 4 debug. Anything above 4
/// enables trace.
pub const fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Render one record as `[<core>] <LEVEL> <target>: <message>`
pub fn write_record<W: Write>(out: &mut W, core: u8, record: &Record<'_>) -> fmt::Result {
    write!(
        out,
        "[{core}] {level} {target}: {message}",
        core = core,
        level = record.level(),
        target = record.target(),
        message = record.args(),
    )
}

fn filter_from_usize(v: usize) -> LevelFilter {
    match v {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `log::Log` over a shared line sink
pub struct LineLogger<S> {
    sink: Mutex<S>,
    level: AtomicUsize,
    current_core: fn() -> u8,
}

impl<S: LineSink + Send> LineLogger<S> {
    pub const fn new(sink: S, level: LevelFilter, current_core: fn() -> u8) -> Self {
        Self {
            sink: Mutex::new(sink),
            level: AtomicUsize::new(level as usize),
            current_core,
        }
    }

    pub fn set_level(&self, level: LevelFilter) {
        self.level.store(level as usize, Ordering::Relaxed);
    }

    pub fn level(&self) -> LevelFilter {
        filter_from_usize(self.level.load(Ordering::Relaxed))
    }

    /// Write a line outside the facade
    pub fn write_line(&self, line: &str) {
        self.sink.lock().write_line(line);
    }

    /// Borrow the sink exclusively
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.sink.lock())
    }
}

impl<S: LineSink + Send> Log for LineLogger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: HeaplessString<MAX_LINE_LEN> = HeaplessString::new();
        // Overflow keeps what fit.
        let _ = write_record(&mut line, (self.current_core)(), record);
        self.sink.lock().write_line(&line);
    }

    fn flush(&self) {}
}
