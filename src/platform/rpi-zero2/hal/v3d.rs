//! V3D register window

use vcore::{RegisterWindow, V3dReg};

use crate::platform_core::mmio::{mmio_read, PERIPHERAL_BASE};

const V3D_BASE: usize = PERIPHERAL_BASE + 0x00C0_0000;

/// Memory-mapped V3D registers
pub struct V3dWindow;

impl RegisterWindow for V3dWindow {
    fn read(&self, reg: V3dReg) -> u32 {
        mmio_read(V3D_BASE + reg.offset())
    }
}
