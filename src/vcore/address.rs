//! ARM <-> VideoCore address translation
//!
//! The VideoCore sees SDRAM through four 1GB aliases. The top two bits of
//! a bus address pick the alias (and so the cache behaviour); the low 30
//! bits are the physical offset the ARM uses directly.
//!
//! ```text
//! Bits 31..30  Alias   Behaviour
//! ──────────────────────────────────────────────
//! 00           0x0     L1 + L2 cached
//! 01           0x4     L2 coherent, non-allocating
//! 10           0x8     L2 cached only
//! 11           0xC     direct, uncached
//! ```
//!
//! The two conversions are not inverses. Going to the processor side
//! throws the alias away; going to the bus side always stamps the
//! [`Alias::Direct`] pattern. Only `processor -> bus -> processor` is a
//! round trip.

use core::fmt;

/// Mask of the physical offset inside a bus address
pub const PHYS_MASK: u32 = 0x3FFF_FFFF;

/// Alias bits used by [`to_bus_address`]
pub const DIRECT_ALIAS_BITS: u32 = 0xC000_0000;

const ALIAS_SHIFT: u32 = 30;

/// VideoCore SDRAM alias selected by bits 31..30
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alias {
    /// 0x0 alias: L1 and L2 cached
    L1L2Cached = 0,
    /// 0x4 alias: coherent with the ARM, does not allocate in L2
    L2Coherent = 1,
    /// 0x8 alias: L2 cached only
    L2Cached = 2,
    /// 0xC alias: uncached
    Direct = 3,
}

impl Alias {
    /// Alias bits in position
    #[inline]
    pub const fn bits(self) -> u32 {
        (self as u32) << ALIAS_SHIFT
    }

    /// Decode the alias of a bus address
    #[inline]
    pub const fn of(bus: u32) -> Self {
        match bus >> ALIAS_SHIFT {
            0 => Alias::L1L2Cached,
            1 => Alias::L2Coherent,
            2 => Alias::L2Cached,
            _ => Alias::Direct,
        }
    }
}

/// Strip the alias bits and return the ARM physical address
#[inline]
pub const fn to_processor_address(bus: u32) -> usize {
    (bus & PHYS_MASK) as usize
}

/// Convert an ARM physical address to a bus address through the uncached alias
#[inline]
pub const fn to_bus_address(addr: usize) -> u32 {
    (addr as u32) | DIRECT_ALIAS_BITS
}

/// Convert an ARM physical address to a bus address through a chosen alias
#[inline]
pub const fn to_bus_address_with(addr: usize, alias: Alias) -> u32 {
    ((addr as u32) & PHYS_MASK) | alias.bits()
}

/// A 32-bit VideoCore bus address, as returned by a memory lock
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusAddress(u32);

impl BusAddress {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn alias(self) -> Alias {
        Alias::of(self.0)
    }

    /// ARM physical address of the same memory
    #[inline]
    pub const fn to_processor(self) -> usize {
        to_processor_address(self.0)
    }

    /// Processor pointer to the buffer
    ///
    /// Producing the pointer is safe; dereferencing it is only valid while
    /// the owning handle stays locked.
    #[inline]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.to_processor() as *mut T
    }
}

impl fmt::Debug for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusAddress({:#010x})", self.0)
    }
}

impl fmt::LowerHex for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

// ============================================================================
// Compile-Time Validation
// ============================================================================

const _: () = {
    assert!(Alias::Direct.bits() == DIRECT_ALIAS_BITS);
    assert!(Alias::L2Coherent.bits() == 0x4000_0000);
    assert!(to_processor_address(0xDEAD_BEEF) == 0x1EAD_BEEF);
};

#[cfg(test)]
mod tests_prop;
