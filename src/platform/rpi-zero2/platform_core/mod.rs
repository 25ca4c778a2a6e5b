//! Low-Level Core Modules
//!
//! Foundation layer with no dependencies on other platform modules.

pub mod mmio;
pub mod mmu;

// Re-exports for convenience
pub use mmio::{core_id, delay_us, micros, micros64, mmio_read, mmio_write};
pub use mmio::{dmb, dsb, sev, wfe};
pub use mmio::PERIPHERAL_BASE;
