//! Mini UART driver for BCM2710/BCM2837
//!
//! Serial console on GPIO14 (TXD1) and GPIO15 (RXD1). TX carries the
//! kernel log; RX stands in for the datagram endpoint the receive
//! workload polls, one line per datagram.

use core::fmt;

use heapless::Vec as HeaplessVec;
use log::info;
use vcore::{LineSink, Transport};

use crate::platform_core::mmio::{delay_us, mmio_read, mmio_write, PERIPHERAL_BASE};

// ============================================================================
// Registers
// ============================================================================

/// AUX peripheral base (contains Mini UART, SPI1, SPI2)
const AUX_BASE: usize = PERIPHERAL_BASE + 0x0021_5000;

const AUX_ENABLES: usize = AUX_BASE + 0x04;
const AUX_MU_IO: usize = AUX_BASE + 0x40;
const AUX_MU_IER: usize = AUX_BASE + 0x44;
const AUX_MU_IIR: usize = AUX_BASE + 0x48;
const AUX_MU_LCR: usize = AUX_BASE + 0x4C;
const AUX_MU_MCR: usize = AUX_BASE + 0x50;
const AUX_MU_LSR: usize = AUX_BASE + 0x54;
const AUX_MU_CNTL: usize = AUX_BASE + 0x60;
const AUX_MU_BAUD: usize = AUX_BASE + 0x68;

// Line status register bits
const LSR_DATA_READY: u32 = 1 << 0;
const LSR_TX_EMPTY: u32 = 1 << 5;

const GPIO_BASE: usize = PERIPHERAL_BASE + 0x0020_0000;
const GPPUD: usize = GPIO_BASE + 0x94;
const GPPUDCLK0: usize = GPIO_BASE + 0x98;

const GPIO_ALT5: u32 = 0b010;
const PULL_OFF: u32 = 0;
const PULL_UP: u32 = 2;

const TX_PIN: u32 = 14;
const RX_PIN: u32 = 15;

/// VPU clock the baud divisor derives from
const SYSTEM_CLOCK: u32 = 250_000_000;

// ============================================================================
// Pin Setup
// ============================================================================

fn set_alt5(pin: u32) {
    let reg = GPIO_BASE + (pin / 10) as usize * 4;
    let shift = (pin % 10) * 3;
    let val = mmio_read(reg) & !(0b111 << shift);
    mmio_write(reg, val | (GPIO_ALT5 << shift));
}

fn set_pull(pin: u32, pull: u32) {
    mmio_write(GPPUD, pull);
    delay_us(150);
    mmio_write(GPPUDCLK0, 1 << pin);
    delay_us(150);
    mmio_write(GPPUD, 0);
    mmio_write(GPPUDCLK0, 0);
}

// ============================================================================
// Mini UART
// ============================================================================

/// Mini UART transmitter
///
/// The registers are global; every instance drives the same port.
pub struct MiniUart;

impl MiniUart {
    pub const fn new() -> Self {
        Self
    }

    /// Formula: baudrate_reg = (system_clock / (8 * baud)) - 1
    const fn divisor(baud: u32) -> u32 {
        SYSTEM_CLOCK / (8 * baud) - 1
    }

    pub fn init(&mut self, baud: u32) {
        mmio_write(AUX_ENABLES, mmio_read(AUX_ENABLES) | 1);

        // Disable TX and RX while configuring
        mmio_write(AUX_MU_CNTL, 0);
        mmio_write(AUX_MU_IER, 0);
        // 8-bit mode
        mmio_write(AUX_MU_LCR, 3);
        mmio_write(AUX_MU_MCR, 0);
        // Clear FIFOs
        mmio_write(AUX_MU_IIR, 0xC6);
        mmio_write(AUX_MU_BAUD, Self::divisor(baud));

        set_pull(TX_PIN, PULL_OFF);
        // Pull-up on RX to avoid noise
        set_pull(RX_PIN, PULL_UP);
        set_alt5(TX_PIN);
        set_alt5(RX_PIN);

        mmio_write(AUX_MU_CNTL, 3);
    }

    pub fn write_byte(&mut self, byte: u8) {
        while mmio_read(AUX_MU_LSR) & LSR_TX_EMPTY == 0 {
            core::hint::spin_loop();
        }
        mmio_write(AUX_MU_IO, byte as u32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(b);
        }
    }

    fn read_pending(&mut self) -> Option<u8> {
        if mmio_read(AUX_MU_LSR) & LSR_DATA_READY == 0 {
            return None;
        }
        Some((mmio_read(AUX_MU_IO) & 0xFF) as u8)
    }
}

impl fmt::Write for MiniUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl LineSink for MiniUart {
    fn write_line(&mut self, line: &str) {
        self.write_bytes(line.as_bytes());
        self.write_bytes(b"\n");
    }
}

// ============================================================================
// Serial Datagrams
// ============================================================================

const LINE_CAPACITY: usize = 256;

/// Mini UART receiver framed into newline-terminated datagrams
pub struct SerialLines {
    uart: MiniUart,
    line: HeaplessVec<u8, LINE_CAPACITY>,
}

impl SerialLines {
    pub const fn new() -> Self {
        Self {
            uart: MiniUart::new(),
            line: HeaplessVec::new(),
        }
    }

    fn take_line(&mut self, buf: &mut [u8]) -> usize {
        let n = self.line.len().min(buf.len());
        buf[..n].copy_from_slice(&self.line[..n]);
        self.line.clear();
        n
    }
}

impl Transport for SerialLines {
    fn bind(&mut self, port: u16) -> Result<(), i32> {
        info!(target: "network", "serial console standing in for UDP port {}", port);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        while let Some(byte) = self.uart.read_pending() {
            match byte {
                b'\r' | b'\n' if self.line.is_empty() => {}
                b'\r' | b'\n' => return Ok(self.take_line(buf)),
                _ => {
                    if self.line.push(byte).is_err() {
                        let n = self.take_line(buf);
                        // Full line already flushed, so this push fits
                        let _ = self.line.push(byte);
                        return Ok(n);
                    }
                }
            }
        }
        Ok(0)
    }
}
