//! Cross-core coordination primitives
//!
//! One coordinator (core 0) and up to three workers rendezvous twice:
//!
//! ```text
//! core 0:   open gate ─────────────────────────► wait mask == 0 ─► halt
//!                │                                     ▲
//! core 1-3:  wait gate ─► run workload ─► clear own bit ┘
//! ```
//!
//! Both rendezvous are busy-wait loops. No interrupts or scheduler are
//! involved, so they work before anything else on the secondary cores is
//! set up.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::error::DispatchError;

/// Number of cores on the BCM2710
pub const MAX_CORES: usize = 4;

/// Index of a processing core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(u8);

impl CoreId {
    /// The boot core, which always coordinates
    pub const BOOT: CoreId = CoreId(0);

    pub const fn new(index: u8) -> Result<Self, DispatchError> {
        if (index as usize) < MAX_CORES {
            Ok(Self(index))
        } else {
            Err(DispatchError::InvalidCore(index))
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_coordinator(self) -> bool {
        self.0 == Self::BOOT.0
    }

    /// This core's bit in a [`CompletionMask`]
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self.0
    }

    /// Every core on the chip, boot core first
    pub fn all() -> impl Iterator<Item = CoreId> {
        (0..MAX_CORES as u8).map(CoreId)
    }
}

/// Per-core dispatch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreState {
    WaitingForBoot = 0,
    Dispatching = 1,
    RunningWorkload = 2,
    Completed = 3,
}

impl CoreState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => CoreState::Dispatching,
            2 => CoreState::RunningWorkload,
            3 => CoreState::Completed,
            _ => CoreState::WaitingForBoot,
        }
    }
}

// ============================================================================
// Boot Gate
// ============================================================================

/// One-shot readiness flag
///
/// Written once by the coordinator, spun on by every worker. The Release
/// store pairs with the Acquire load, so everything the coordinator wrote
/// before [`open`](Self::open) is visible to a worker once
/// [`wait`](Self::wait) returns.
pub struct BootGate {
    ready: AtomicBool,
}

impl BootGate {
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Open the gate. The transition is monotonic; a second call fails
    pub fn open(&self) -> Result<(), DispatchError> {
        if self.ready.swap(true, Ordering::Release) {
            return Err(DispatchError::GateAlreadyOpen);
        }
        Ok(())
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Spin until the coordinator opens the gate
    pub fn wait(&self) {
        while !self.is_open() {
            core::hint::spin_loop();
        }
    }
}

// ============================================================================
// Completion Mask
// ============================================================================

/// Many-to-one shutdown rendezvous
///
/// Starts with one bit per worker core set. Each worker clears only its
/// own bit, and only once; nothing ever sets a bit again.
pub struct CompletionMask {
    bits: AtomicU32,
}

impl CompletionMask {
    /// Mask for cores `1..cores`; the coordinator has no bit
    pub const fn for_workers(cores: usize) -> Self {
        let cores = if cores > MAX_CORES { MAX_CORES } else { cores };
        let all = (1u32 << cores) - 1;
        Self {
            bits: AtomicU32::new(all & !CoreId::BOOT.bit()),
        }
    }

    /// Clear `core`'s bit
    pub fn complete(&self, core: CoreId) -> Result<(), DispatchError> {
        let bit = core.bit();
        let prev = self.bits.fetch_and(!bit, Ordering::AcqRel);
        if prev & bit == 0 {
            return Err(DispatchError::AlreadyCompleted(core.index()));
        }
        Ok(())
    }

    /// Bits of the workers still running
    #[inline]
    pub fn pending(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_clear(&self) -> bool {
        self.pending() == 0
    }

    /// Spin until every worker has completed
    pub fn wait_clear(&self) {
        while !self.is_clear() {
            core::hint::spin_loop();
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shutdown request polled by long-running workloads
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

// ============================================================================
// Coordination Arena
// ============================================================================

/// Everything the cores share, owned by whoever starts them
pub struct CoreCoordination {
    pub gate: BootGate,
    pub mask: CompletionMask,
    pub cancel: CancelToken,
    states: [AtomicU8; MAX_CORES],
}

impl CoreCoordination {
    pub const fn new(cores: usize) -> Self {
        Self {
            gate: BootGate::new(),
            mask: CompletionMask::for_workers(cores),
            cancel: CancelToken::new(),
            states: [const { AtomicU8::new(CoreState::WaitingForBoot as u8) }; MAX_CORES],
        }
    }

    pub fn state(&self, core: CoreId) -> CoreState {
        CoreState::from_u8(self.states[core.index() as usize].load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, core: CoreId, state: CoreState) {
        self.states[core.index() as usize].store(state as u8, Ordering::Release);
    }
}
