//! Low-level MMIO, timing, and memory barrier primitives
//!
//! Everything the drivers and the SMP bring-up touch directly.

use core::ptr::{read_volatile, write_volatile};

// ============================================================================
// Hardware Base Addresses
// ============================================================================

/// BCM2837 peripheral base address (Pi Zero 2W / Pi 3)
pub const PERIPHERAL_BASE: usize = 0x3F00_0000;

// ============================================================================
// System Timer Registers
// ============================================================================

const SYSTIMER_BASE: usize = PERIPHERAL_BASE + 0x0000_3000;

/// Counter low 32 bits (1MHz)
const SYSTIMER_CLO: usize = SYSTIMER_BASE + 0x04;

/// Counter high 32 bits
const SYSTIMER_CHI: usize = SYSTIMER_BASE + 0x08;

// ============================================================================
// MMIO Access Functions
// ============================================================================

/// Read a 32-bit value from an MMIO address
#[inline(always)]
pub fn mmio_read(addr: usize) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

/// Write a 32-bit value to an MMIO address
#[inline(always)]
pub fn mmio_write(addr: usize, val: u32) {
    unsafe { write_volatile(addr as *mut u32, val) }
}

// ============================================================================
// Memory Barriers
// ============================================================================

/// Data Memory Barrier
#[inline(always)]
pub fn dmb() {
    unsafe { core::arch::asm!("dmb sy", options(nostack)); }
}

/// Data Synchronization Barrier - all memory accesses complete before the
/// next instruction executes
#[inline(always)]
pub fn dsb() {
    unsafe { core::arch::asm!("dsb sy", options(nostack)); }
}

/// Send Event - wakes cores waiting in WFE
#[inline(always)]
pub fn sev() {
    unsafe { core::arch::asm!("sev", options(nostack)); }
}

/// Wait For Event
#[inline(always)]
pub fn wfe() {
    unsafe { core::arch::asm!("wfe", options(nostack)); }
}

// ============================================================================
// CPU
// ============================================================================

/// Index of the executing core (MPIDR_EL1 Aff0)
#[inline]
pub fn core_id() -> u8 {
    let mpidr: u64;
    unsafe { core::arch::asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nomem, nostack)); }
    (mpidr & 0xFF) as u8
}

// ============================================================================
// Timing Functions
// ============================================================================

/// System timer, low word only (wraps after ~71 minutes)
#[inline]
pub fn micros() -> u32 {
    mmio_read(SYSTIMER_CLO)
}

/// Full 64-bit system timer in microseconds
pub fn micros64() -> u64 {
    loop {
        let hi = mmio_read(SYSTIMER_CHI);
        let lo = mmio_read(SYSTIMER_CLO);
        // Retry if the low word wrapped between the two reads.
        if mmio_read(SYSTIMER_CHI) == hi {
            return ((hi as u64) << 32) | lo as u64;
        }
    }
}

/// Delay for specified number of microseconds
pub fn delay_us(us: u32) {
    let start = micros();
    while micros().wrapping_sub(start) < us {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Cache Line Operations
// ============================================================================

/// Cortex-A53 D-cache line size
const CACHE_LINE: usize = 64;

/// Clean and invalidate the D-cache line holding `addr`
///
/// # Safety
/// `addr` must be mapped
#[inline(always)]
pub unsafe fn flush_dcache_line(addr: usize) {
    unsafe {
        core::arch::asm!("dc civac, {}", in(reg) addr, options(nostack));
        core::arch::asm!("dsb sy", options(nostack));
    }
}

/// Clean and invalidate every D-cache line overlapping `[start, start + len)`
///
/// # Safety
/// The range must be mapped
pub unsafe fn flush_dcache_range(start: usize, len: usize) {
    let mut line = start & !(CACHE_LINE - 1);
    while line < start + len {
        unsafe { core::arch::asm!("dc civac, {}", in(reg) line, options(nostack)); }
        line += CACHE_LINE;
    }
    dsb();
}
