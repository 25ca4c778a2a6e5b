//! # Raspberry Pi Zero 2W Bare-Metal Kernel Entry Point
//!
//! Core 0 brings up the console, reads the firmware command line, checks
//! the V3D block and resolves the per-core workload table. Cores 1-3 are
//! then released into the dispatcher while core 0 coordinates.

#![no_std]
#![no_main]

mod boot;
mod hal;
mod logger;
mod multicore;
mod platform_core;

use core::fmt::Write;
use core::panic::PanicInfo;

use log::{error, info, warn};
use vcore::mailbox::get_command_line;
use vcore::{
    collab::SpinYield, verify_identity, CoreCoordination, CoreId, DispatchTable, Dispatcher, GpuDemo,
    KernelConfig, KernelOptions, ReceiveLoop, Runnable, SerializedChannel, Workloads, MAX_CORES,
};

use crate::hal::{FirmwareMailbox, MiniUart, SerialLines, SystemClock, V3dWindow};
use crate::logger::Console;

// =============================================================================
// Shared State
// =============================================================================

/// Boot gate, completion mask, cancellation and per-core states
static COORD: CoreCoordination = CoreCoordination::new(MAX_CORES);

/// The one firmware mailbox, shared by every core
static MAILBOX: SerializedChannel<FirmwareMailbox> = SerializedChannel::new(FirmwareMailbox::new());

const CMDLINE_LEN: usize = 256;

// =============================================================================
// Kernel Entry
// =============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn kernel_main() -> ! {
    // SAFETY: core 0, before any other core is released.
    unsafe { platform_core::mmu::init() };
    logger::init();

    let mut config = KernelConfig::default();
    let mut cmdline = [0u8; CMDLINE_LEN];
    match get_command_line(&mut &MAILBOX, &mut cmdline) {
        Ok(line) => config.apply(&KernelOptions::parse(line)),
        Err(e) => warn!(target: "kernel", "no command line: {}", e),
    }
    logger::set_level(config.log_level);
    info!(target: "kernel", "Raspberry Pi Zero 2W, {} cores", MAX_CORES);

    let gpu_ready = verify_identity(&mut &MAILBOX, &V3dWindow, &config.v3d);

    let mut gpu_demo = GpuDemo::new(&MAILBOX, Console, config.gpu_demo);
    let mut network = ReceiveLoop::new(SerialLines::new(), SpinYield, SystemClock, Console, config.net);

    let workloads = Workloads {
        gpu_demo: gpu_ready.then_some(&mut gpu_demo as &mut dyn Runnable),
        network: Some(&mut network as &mut dyn Runnable),
    };
    let table = match DispatchTable::resolve(config.assignments, workloads) {
        Ok(table) => table,
        Err(e) => {
            error!(target: "kernel", "bad core assignment: {}", e);
            halt()
        }
    };

    let dispatcher = Dispatcher::new(&COORD, table);
    // SAFETY: this frame never returns, so `dispatcher` outlives every core.
    unsafe { multicore::publish(&dispatcher) };
    for core in CoreId::all().skip(1) {
        // SAFETY: cores 1-3 are still parked in the firmware spin loop.
        unsafe { multicore::start_core(core) };
    }

    match dispatcher.run(CoreId::BOOT) {
        Ok(Some(report)) if report.all_succeeded() => info!(target: "kernel", "all workloads finished"),
        Ok(Some(report)) => warn!(target: "kernel", "workload failures: {:#06b}", report.failures),
        Ok(None) => {}
        Err(e) => error!(target: "kernel", "dispatch: {}", e),
    }
    halt()
}

fn halt() -> ! {
    multicore::park()
}

// =============================================================================
// Panic Handler
// =============================================================================

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // Bypass the logger: its lock may be held by the panicking core.
    let mut uart = MiniUart::new();
    let _ = write!(uart, "\n!!! PANIC on core {} !!!\n", platform_core::core_id());
    if let Some(loc) = info.location() {
        let _ = write!(uart, "{}:{}\n", loc.file(), loc.line());
    }
    let _ = write!(uart, "{}\n", info.message());
    COORD.cancel.cancel();
    halt()
}
