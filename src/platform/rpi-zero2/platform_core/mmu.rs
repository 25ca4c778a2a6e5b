//! MMU setup for RPi Zero 2W (BCM2837)
//!
//! Identity map with caches on. Exclusive loads and stores, and so every
//! atomic the dispatcher relies on, need Normal cacheable memory.
//!
//! Memory map:
//!   0x00000000 - 0x3EFFFFFF: RAM (Normal, cacheable)
//!   0x3F000000 - 0x3FFFFFFF: Peripherals (Device)
//!   0x40000000 - 0x7FFFFFFF: Local peripherals (Device)

use core::arch::asm;

// 4KB-aligned page tables
#[repr(C, align(4096))]
struct PageTable([u64; 512]);

static mut L1_TABLE: PageTable = PageTable([0; 512]);
static mut L2_TABLE: PageTable = PageTable([0; 512]);

// Descriptor type bits [1:0]
const DESC_BLOCK: u64 = 0b01; // L1=1GB, L2=2MB
const DESC_TABLE: u64 = 0b11;

// Block descriptor attribute bits
const ATTR_IDX_SHIFT: u64 = 2;
const SH_INNER: u64 = 3 << 8;
const AF: u64 = 1 << 10;

// MAIR attribute indices
const ATTR_DEVICE: u64 = 0; // Device-nGnRnE
const ATTR_NORMAL: u64 = 1; // Normal, Write-Back

const BLOCK_2M: u64 = 0x20_0000;
/// First L2 entry of the peripheral window (0x3F000000 / 2MB)
const PERIPHERAL_BLOCK: usize = 504;

/// Build the tables and turn the MMU on for the boot core
///
/// # Safety
/// Core 0 only, once, before any other core runs.
pub unsafe fn init() {
    unsafe {
        build_tables();
        enable();
    }
}

/// Turn the MMU on with the tables built by [`init`]
///
/// # Safety
/// [`init`] must have completed on core 0.
pub unsafe fn enable() {
    let mair: u64 = (0x00 << (ATTR_DEVICE * 8)) | (0xFF << (ATTR_NORMAL * 8));
    let tcr: u64 = 25           // T0SZ=25: 39-bit VA space
        | (0b01 << 8)           // IRGN0: Inner Write-Back
        | (0b01 << 10)          // ORGN0: Outer Write-Back
        | (0b11 << 12);         // SH0: Inner Shareable
    let ttbr = &raw const L1_TABLE as u64;

    unsafe {
        asm!("msr mair_el1, {}", in(reg) mair);
        asm!("msr tcr_el1, {}", in(reg) tcr);
        asm!("msr ttbr0_el1, {}", in(reg) ttbr);
        asm!("dsb sy", "isb");
        asm!("tlbi vmalle1", "dsb ish", "isb");

        let mut sctlr: u64;
        asm!("mrs {}, sctlr_el1", out(reg) sctlr);
        sctlr |= 1 << 0; // M
        sctlr |= 1 << 2; // C
        sctlr |= 1 << 12; // I
        asm!("msr sctlr_el1, {}", "isb", in(reg) sctlr);
    }
}

unsafe fn build_tables() {
    let l1 = &raw mut L1_TABLE;
    let l2 = &raw mut L2_TABLE;

    let normal = DESC_BLOCK | (ATTR_NORMAL << ATTR_IDX_SHIFT) | SH_INNER | AF;
    let device = DESC_BLOCK | (ATTR_DEVICE << ATTR_IDX_SHIFT) | AF;

    unsafe {
        for i in 0..512 {
            let attrs = if i < PERIPHERAL_BLOCK { normal } else { device };
            (*l2).0[i] = i as u64 * BLOCK_2M | attrs;
        }
        (*l1).0[0] = l2 as u64 | DESC_TABLE;
        (*l1).0[1] = 0x4000_0000 | device;
    }
}
