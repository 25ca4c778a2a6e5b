//! Secondary core startup
//!
//! The firmware parks cores 1-3 reading their spin table slot. Writing a
//! trampoline address there and sending an event releases the core; the
//! trampoline sets its stack and enters [`secondary_rust_entry`], which
//! runs the published dispatcher for that core.

use core::ptr::{self, write_volatile};
use core::sync::atomic::{AtomicPtr, Ordering};

use log::{error, warn};
use vcore::{CoreId, Dispatcher};

use crate::platform_core::mmio::{self, core_id, dmb, dsb, sev, wfe};
use crate::platform_core::mmu;

// ============================================================================
// Spin Table Addresses (where GPU firmware parks secondary cores)
// ============================================================================

const CORE1_SPIN_ADDR: usize = 0xE0;
const CORE2_SPIN_ADDR: usize = 0xE8;
const CORE3_SPIN_ADDR: usize = 0xF0;

// ============================================================================
// Core Entry Trampolines
//
// Secondary cores have no stack when the firmware wakes them. The stack is
// set in assembly before any Rust code runs.
// ============================================================================

core::arch::global_asm!(
    r#"
.section .text
.global core1_trampoline
.global core2_trampoline
.global core3_trampoline

core1_trampoline:
    ldr     x1, =__core1_stack_top
    mov     sp, x1
    b       secondary_rust_entry

core2_trampoline:
    ldr     x1, =__core2_stack_top
    mov     sp, x1
    b       secondary_rust_entry

core3_trampoline:
    ldr     x1, =__core3_stack_top
    mov     sp, x1
    b       secondary_rust_entry
"#
);

unsafe extern "C" {
    fn core1_trampoline() -> !;
    fn core2_trampoline() -> !;
    fn core3_trampoline() -> !;
}

// ============================================================================
// Published Dispatcher
// ============================================================================

/// Dispatcher every secondary core runs; set once by core 0
static DISPATCHER: AtomicPtr<Dispatcher<'static>> = AtomicPtr::new(ptr::null_mut());

/// Make `dispatcher` visible to the secondary cores
///
/// # Safety
/// `dispatcher` must stay alive and in place for as long as any core runs
/// it. The kernel guarantees this by publishing from a frame that never
/// returns.
pub unsafe fn publish(dispatcher: &Dispatcher<'_>) {
    let raw = ptr::from_ref(dispatcher).cast_mut().cast::<Dispatcher<'static>>();
    DISPATCHER.store(raw, Ordering::Release);
}

/// Rust entry of cores 1-3, called from the trampolines
#[unsafe(no_mangle)]
pub extern "C" fn secondary_rust_entry() -> ! {
    // SAFETY: core 0 built the tables before releasing any core.
    unsafe { mmu::enable() };

    let raw = DISPATCHER.load(Ordering::Acquire);
    // SAFETY: non-null only after `publish`, whose caller keeps it alive.
    let Some(dispatcher) = (unsafe { raw.as_ref() }) else {
        park()
    };

    match CoreId::new(core_id()).and_then(|core| dispatcher.run(core)) {
        Ok(_) => {}
        Err(e) => error!(target: "smp", "core {}: {}", core_id(), e),
    }
    park()
}

/// Sleep forever
pub fn park() -> ! {
    loop {
        wfe();
    }
}

// ============================================================================
// Core Startup
// ============================================================================

/// Release secondary core `core` into its trampoline
///
/// # Safety
/// The spin table must be mapped and the core still parked by the firmware.
/// Call [`publish`] first or the core parks again immediately.
pub unsafe fn start_core(core: CoreId) {
    let (spin_addr, trampoline) = match core.index() {
        1 => (CORE1_SPIN_ADDR, core1_trampoline as usize as u64),
        2 => (CORE2_SPIN_ADDR, core2_trampoline as usize as u64),
        3 => (CORE3_SPIN_ADDR, core3_trampoline as usize as u64),
        _ => {
            warn!(target: "smp", "core {} has no spin table slot", core.index());
            return;
        }
    };

    dsb();
    unsafe {
        write_volatile(spin_addr as *mut u64, trampoline);
        dmb();
        // Firmware reads the slot from RAM
        mmio::flush_dcache_line(spin_addr);
    }
    sev();
}
