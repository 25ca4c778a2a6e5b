//! GPU memory demo
//!
//! Allocates one buffer through the firmware, locks it, and prints its
//! bus address next to the processor pointer it maps to. Whatever step
//! fails, the line for the step reached so far is still printed.

use core::fmt::Write;

use heapless::String as HeaplessString;
use log::{info, warn};

use crate::address::BusAddress;
use crate::collab::LineSink;
use crate::config::GpuDemoConfig;
use crate::dispatch::{Runnable, WorkloadContext, WorkloadKind};
use crate::error::{GpuError, WorkloadError};
use crate::gpu_mem::GpuMemory;
use crate::mailbox::PropertyChannel;

/// Diagnostic line: "xxxxxxxx 0xxxxxxxxx" at most
pub type Diagnostic = HeaplessString<32>;

/// What a completed demo found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoReport {
    /// Raw handle; already released when the demo frees its buffer
    pub handle: u32,
    pub bus: BusAddress,
    pub processor: usize,
}

/// A demo step failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoFailure {
    /// Name of the step that failed
    pub diagnostic: Diagnostic,
    pub error: GpuError,
}

/// Allocate/lock demo over a firmware channel
pub struct GpuDemo<C, S> {
    gpu: GpuMemory<C>,
    sink: S,
    config: GpuDemoConfig,
}

impl<C: PropertyChannel, S: LineSink> GpuDemo<C, S> {
    pub fn new(channel: C, sink: S, config: GpuDemoConfig) -> Self {
        Self {
            gpu: GpuMemory::new(channel),
            sink,
            config,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn channel(&mut self) -> &mut C {
        self.gpu.channel()
    }

    /// Run the sequence once and print its diagnostic line
    pub fn execute(&mut self) -> Result<DemoReport, DemoFailure> {
        let mut diagnostic = Diagnostic::new();
        let result = self.steps(&mut diagnostic);
        self.sink.write_line(&diagnostic);

        result.map_err(|error| DemoFailure { diagnostic, error })
    }

    fn steps(&mut self, diagnostic: &mut Diagnostic) -> Result<DemoReport, GpuError> {
        let cfg = self.config;

        step(diagnostic, "MemAlloc");
        let handle = self.gpu.allocate(cfg.size, cfg.alignment, cfg.flags)?;

        step(diagnostic, "MemLock");
        let bus = match self.gpu.lock(&handle) {
            Ok(bus) => bus,
            Err(e) => {
                if let Err(free_err) = self.gpu.free(handle) {
                    warn!(target: "gpu", "free after failed lock: {}", free_err);
                }
                return Err(e);
            }
        };

        let processor = bus.to_processor();
        diagnostic.clear();
        // 8 + 1 + 10 chars always fit.
        let _ = write!(diagnostic, "{:08x} {:#010x}", bus.raw(), processor);

        let report = DemoReport {
            handle: handle.raw(),
            bus,
            processor,
        };
        info!(target: "gpu", "{:#x} bytes at bus {:?}, processor {:#010x}", cfg.size, bus, processor);

        if cfg.release {
            if let Err(e) = self.gpu.unlock(&handle) {
                warn!(target: "gpu", "unlock failed: {}", e);
            }
            if let Err(e) = self.gpu.free(handle) {
                warn!(target: "gpu", "free failed: {}", e);
            }
        }

        Ok(report)
    }
}

fn step(diagnostic: &mut Diagnostic, name: &str) {
    diagnostic.clear();
    let _ = diagnostic.push_str(name);
}

impl<C, S> Runnable for GpuDemo<C, S>
where
    C: PropertyChannel + Send,
    S: LineSink + Send,
{
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::GpuDemo
    }

    fn run(&mut self, _ctx: &WorkloadContext<'_>) -> Result<(), WorkloadError> {
        self.execute().map(|_| ()).map_err(|f| WorkloadError::Gpu(f.error))
    }
}
