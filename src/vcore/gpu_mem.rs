//! GPU memory manager
//!
//! Thin wrappers over the firmware's memory tags. The firmware owns the
//! allocation table; this side keeps no state beyond the handle it is
//! given.
//!
//! ```text
//! allocate ──► MemHandle ──lock──► BusAddress ──► processor pointer
//!                  │  ▲               │
//!                  │  └────unlock─────┘
//!                  └──free (consumes the handle)
//! ```

use core::fmt;
use core::num::NonZeroU32;

use bitflags::bitflags;
use log::{debug, warn};

use crate::address::{Alias, BusAddress};
use crate::error::GpuError;
use crate::mailbox::{self, tag, PropertyChannel};

bitflags! {
    /// Allocation flags understood by the firmware allocator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemFlags: u32 {
        /// Firmware may shrink the block to nothing under pressure
        const DISCARDABLE = 1 << 0;
        /// 0x0 alias
        const NORMAL = 0 << 2;
        /// 0xC alias
        const DIRECT = 1 << 2;
        /// 0x8 alias
        const COHERENT = 2 << 2;
        /// 0x4 alias
        const L1_NONALLOCATING = Self::DIRECT.bits() | Self::COHERENT.bits();
        /// Zero-fill on allocation
        const ZERO = 1 << 4;
        /// Skip the fill entirely
        const NO_INIT = 1 << 5;
        /// Expected to stay locked
        const HINT_PERMALOCK = 1 << 6;
    }
}

impl MemFlags {
    const ALIAS_MASK: u32 = 3 << 2;

    /// Alias a lock of this allocation will hand back
    pub const fn alias(self) -> Alias {
        match (self.bits() & Self::ALIAS_MASK) >> 2 {
            0 => Alias::L1L2Cached,
            1 => Alias::Direct,
            2 => Alias::L2Cached,
            _ => Alias::L2Coherent,
        }
    }
}

/// Firmware allocation handle
///
/// Not `Copy`: [`GpuMemory::free`] consumes it, so a freed handle cannot
/// be locked again.
#[derive(PartialEq, Eq)]
pub struct MemHandle(NonZeroU32);

impl MemHandle {
    /// Adopt a handle obtained outside this manager
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(h) => Some(Self(h)),
            None => None,
        }
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for MemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemHandle({:#x})", self.0)
    }
}

/// GPU memory operations over a firmware channel
pub struct GpuMemory<C> {
    channel: C,
}

impl<C: PropertyChannel> GpuMemory<C> {
    pub const fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Borrow the underlying channel
    pub fn channel(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Allocate `size` bytes of GPU memory
    pub fn allocate(&mut self, size: u32, alignment: u32, flags: MemFlags) -> Result<MemHandle, GpuError> {
        if flags.contains(MemFlags::ZERO | MemFlags::NO_INIT) {
            warn!(target: "gpu", "ZERO and NO_INIT both set; buffer contents undefined");
        }

        let [raw] = mailbox::request::<_, 1>(&mut self.channel, tag::MEM_ALLOCATE, &[size, alignment, flags.bits()])?;
        let handle = MemHandle::from_raw(raw).ok_or(GpuError::ZeroHandle)?;

        debug!(target: "gpu", "allocated {:#x} bytes (align {:#x}, {:?}) -> {:?}", size, alignment, flags, handle);
        Ok(handle)
    }

    /// Pin an allocation and return its bus address
    pub fn lock(&mut self, handle: &MemHandle) -> Result<BusAddress, GpuError> {
        let [raw] = mailbox::request::<_, 1>(&mut self.channel, tag::MEM_LOCK, &[handle.raw()])?;
        if raw == 0 {
            return Err(GpuError::ZeroAddress);
        }

        let bus = BusAddress::new(raw);
        debug!(target: "gpu", "{:?} locked at {:?}", handle, bus);
        Ok(bus)
    }

    /// Unpin an allocation. The handle stays valid for another lock or a free
    pub fn unlock(&mut self, handle: &MemHandle) -> Result<(), GpuError> {
        let [status] = mailbox::request::<_, 1>(&mut self.channel, tag::MEM_UNLOCK, &[handle.raw()])?;
        check_status(status)?;
        debug!(target: "gpu", "{:?} unlocked", handle);
        Ok(())
    }

    /// Release an allocation
    ///
    /// The handle is consumed even when the firmware reports a failure.
    pub fn free(&mut self, handle: MemHandle) -> Result<(), GpuError> {
        let [status] = mailbox::request::<_, 1>(&mut self.channel, tag::MEM_RELEASE, &[handle.raw()])?;
        check_status(status)?;
        debug!(target: "gpu", "{:?} released", handle);
        Ok(())
    }
}

fn check_status(status: u32) -> Result<(), GpuError> {
    match status {
        0 => Ok(()),
        s => Err(GpuError::Status(s)),
    }
}
