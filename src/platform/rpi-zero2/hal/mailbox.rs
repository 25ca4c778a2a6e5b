//! VideoCore Mailbox Interface
//!
//! Hardware side of [`vcore::PropertyChannel`]: frames the caller's tags
//! into a 16-byte aligned property buffer, posts its bus address on the
//! property channel and waits for the firmware to hand it back.

use vcore::mailbox::{self, tag};
use vcore::{to_bus_address, MailboxError, PropertyChannel};

use crate::platform_core::mmio::{dmb, flush_dcache_range, micros, mmio_read, mmio_write, PERIPHERAL_BASE};

// ============================================================================
// Mailbox Registers
// ============================================================================

const MBOX_BASE: usize = PERIPHERAL_BASE + 0x0000_B880;

const MBOX_READ: usize = MBOX_BASE + 0x00;
const MBOX_STATUS: usize = MBOX_BASE + 0x18;
const MBOX_WRITE: usize = MBOX_BASE + 0x20;

// Status register bits
const MBOX_FULL: u32 = 0x8000_0000;
const MBOX_EMPTY: u32 = 0x4000_0000;

// Response codes
const MBOX_RESPONSE_SUCCESS: u32 = 0x8000_0000;

/// Property tags, ARM to VC
const CHANNEL_PROPERTY: u32 = 8;

/// Longest wait for either status bit
const TIMEOUT_US: u32 = 1_000_000;

/// Buffer words: size, code, tags..., end
const BUFFER_WORDS: usize = 128;

// ============================================================================
// Mailbox Buffer
// ============================================================================

#[repr(C, align(16))]
struct PropertyBuffer {
    data: [u32; BUFFER_WORDS],
}

// ============================================================================
// Firmware Channel
// ============================================================================

/// The ARM-to-VideoCore property channel
///
/// Not reentrant; the kernel keeps the only instance inside a
/// [`vcore::SerializedChannel`].
pub struct FirmwareMailbox {
    buffer: PropertyBuffer,
}

impl FirmwareMailbox {
    pub const fn new() -> Self {
        Self {
            buffer: PropertyBuffer { data: [0; BUFFER_WORDS] },
        }
    }

    /// Post the buffer and wait for the firmware to return it
    fn call(&mut self) -> Result<(), MailboxError> {
        let addr = self.buffer.data.as_ptr() as usize;
        if addr & 0xF != 0 {
            return Err(MailboxError::NotAligned);
        }
        let message = to_bus_address(addr) | CHANNEL_PROPERTY;
        let len = core::mem::size_of::<PropertyBuffer>();

        // The firmware reads and writes RAM through the uncached alias
        unsafe { flush_dcache_range(addr, len) };
        wait_status_clear(MBOX_FULL)?;
        dmb();
        mmio_write(MBOX_WRITE, message);

        loop {
            wait_status_clear(MBOX_EMPTY)?;
            let response = mmio_read(MBOX_READ);
            dmb();
            // Replies for other channels are not ours
            if response == message {
                unsafe { flush_dcache_range(addr, len) };
                return Ok(());
            }
        }
    }
}

fn wait_status_clear(bit: u32) -> Result<(), MailboxError> {
    let start = micros();
    while mmio_read(MBOX_STATUS) & bit != 0 {
        if micros().wrapping_sub(start) > TIMEOUT_US {
            return Err(MailboxError::Timeout);
        }
        core::hint::spin_loop();
    }
    Ok(())
}

impl PropertyChannel for FirmwareMailbox {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        mailbox::validate(tags)?;
        // Two header words and the end tag around the caller's tags
        let end = tags.len() + 2;
        if end >= BUFFER_WORDS {
            return Err(MailboxError::Malformed);
        }

        let data = &mut self.buffer.data;
        data[0] = ((end + 1) * 4) as u32;
        data[1] = 0;
        data[2..end].copy_from_slice(tags);
        data[end] = tag::END;

        self.call()?;

        let data = &self.buffer.data;
        if data[1] != MBOX_RESPONSE_SUCCESS {
            return Err(MailboxError::RequestFailed(data[1]));
        }
        tags.copy_from_slice(&data[2..end]);
        mailbox::complete(tags)
    }
}
