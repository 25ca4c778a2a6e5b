//! Hardware Abstraction Layer
//!
//! Board implementations of the vcore platform traits: firmware mailbox,
//! V3D registers, the Mini UART and the system timer.
//! Depends on: platform_core

pub mod mailbox;
pub mod timer;
pub mod uart;
pub mod v3d;

// Re-exports for convenience
pub use mailbox::FirmwareMailbox;
pub use timer::SystemClock;
pub use uart::{MiniUart, SerialLines};
pub use v3d::V3dWindow;
