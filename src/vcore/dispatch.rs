//! Core Dispatcher
//!
//! Binds each worker core to one workload through a declarative table and
//! drives the two-phase rendezvous in [`CoreCoordination`].
//!
//! # Per-core states
//!
//! ```text
//! WaitingForBoot ──gate open──► Dispatching ──► RunningWorkload ──► Completed
//! ```
//!
//! Core 0 never runs a workload: it opens the gate, marks itself
//! `Completed` and waits for the completion mask to drain.

use core::sync::atomic::{AtomicU32, Ordering};

use log::{error, info, warn};
use spin::Mutex;

use crate::coord::{CancelToken, CoreCoordination, CoreId, CoreState, MAX_CORES};
use crate::error::{DispatchError, WorkloadError};

/// What a core runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    GpuDemo,
    NetworkReceive,
    Idle,
}

/// What a running workload may consult
pub struct WorkloadContext<'a> {
    pub core: CoreId,
    /// Polled by long-running loops at each iteration
    pub cancel: &'a CancelToken,
}

/// A workload a core can run to completion
pub trait Runnable: Send {
    fn kind(&self) -> WorkloadKind;

    fn run(&mut self, ctx: &WorkloadContext<'_>) -> Result<(), WorkloadError>;
}

/// Placeholder workload; returns at once
pub struct Idle;

impl Runnable for Idle {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Idle
    }

    fn run(&mut self, _ctx: &WorkloadContext<'_>) -> Result<(), WorkloadError> {
        Ok(())
    }
}

/// One row of the core table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub core: u8,
    pub workload: WorkloadKind,
}

impl Assignment {
    pub const fn new(core: u8, workload: WorkloadKind) -> Self {
        Self { core, workload }
    }
}

/// Workload capabilities available at startup
///
/// A capability left `None` was not built, e.g. the GPU demo after a
/// failed identity check.
#[derive(Default)]
pub struct Workloads<'a> {
    pub gpu_demo: Option<&'a mut dyn Runnable>,
    pub network: Option<&'a mut dyn Runnable>,
}

struct Slot<'a> {
    kind: WorkloadKind,
    workload: Mutex<Option<&'a mut dyn Runnable>>,
}

impl Slot<'_> {
    fn idle() -> Self {
        Self {
            kind: WorkloadKind::Idle,
            workload: Mutex::new(None),
        }
    }
}

/// Resolved core-to-workload binding
pub struct DispatchTable<'a> {
    slots: [Slot<'a>; MAX_CORES],
}

impl<'a> DispatchTable<'a> {
    /// Validate `assignments` and bind each row to its capability
    pub fn resolve(assignments: &[Assignment], mut workloads: Workloads<'a>) -> Result<Self, DispatchError> {
        let mut slots: [Slot<'a>; MAX_CORES] = core::array::from_fn(|_| Slot::idle());
        let mut seen = [false; MAX_CORES];
        let mut used_gpu = false;
        let mut used_net = false;

        for row in assignments {
            let core = CoreId::new(row.core)?;
            if core.is_coordinator() {
                return Err(DispatchError::CoordinatorAssigned);
            }

            let i = core.index() as usize;
            if seen[i] {
                return Err(DispatchError::DuplicateCore(row.core));
            }
            seen[i] = true;

            let used = match row.workload {
                WorkloadKind::GpuDemo => &mut used_gpu,
                WorkloadKind::NetworkReceive => &mut used_net,
                WorkloadKind::Idle => continue,
            };
            if *used {
                return Err(DispatchError::WorkloadReused(row.workload));
            }
            *used = true;

            let capability = match row.workload {
                WorkloadKind::GpuDemo => workloads.gpu_demo.take(),
                _ => workloads.network.take(),
            };

            match capability {
                Some(w) => {
                    slots[i] = Slot {
                        kind: row.workload,
                        workload: Mutex::new(Some(w)),
                    }
                }
                None => {
                    warn!(target: "smp", "core {}: {:?} unavailable, idling", row.core, row.workload);
                }
            }
        }

        Ok(Self { slots })
    }

    /// Workload bound to `core`
    pub fn kind(&self, core: CoreId) -> WorkloadKind {
        self.slots[core.index() as usize].kind
    }

    /// Hand out `core`'s workload; `None` after the first call
    fn take(&self, core: CoreId) -> Option<&'a mut dyn Runnable> {
        self.slots[core.index() as usize].workload.lock().take()
    }
}

/// Coordinator's view at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Bit per core whose workload returned an error
    pub failures: u32,
    /// Shutdown was requested rather than every workload returning on its own
    pub cancelled: bool,
}

impl ShutdownReport {
    pub fn failed(&self, core: CoreId) -> bool {
        self.failures & core.bit() != 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures == 0
    }
}

/// Runs every core's side of the dispatch protocol
pub struct Dispatcher<'a> {
    coord: &'a CoreCoordination,
    table: DispatchTable<'a>,
    failures: AtomicU32,
}

impl<'a> Dispatcher<'a> {
    pub fn new(coord: &'a CoreCoordination, table: DispatchTable<'a>) -> Self {
        Self {
            coord,
            table,
            failures: AtomicU32::new(0),
        }
    }

    pub fn coordination(&self) -> &'a CoreCoordination {
        self.coord
    }

    pub fn table(&self) -> &DispatchTable<'a> {
        &self.table
    }

    /// Entry point for every core
    ///
    /// Core 0 returns the shutdown report once all workers completed.
    /// Workers return `None` after clearing their completion bit.
    pub fn run(&self, core: CoreId) -> Result<Option<ShutdownReport>, DispatchError> {
        if core.is_coordinator() {
            self.coordinate().map(Some)
        } else {
            self.work(core).map(|()| None)
        }
    }

    /// Ask long-running workloads to return
    pub fn request_shutdown(&self) {
        info!(target: "smp", "shutdown requested");
        self.coord.cancel.cancel();
    }

    fn coordinate(&self) -> Result<ShutdownReport, DispatchError> {
        let core = CoreId::BOOT;
        self.coord.gate.open()?;
        self.coord.set_state(core, CoreState::Completed);
        info!(target: "smp", "boot gate open, waiting on {:#06b}", self.coord.mask.pending());

        self.coord.mask.wait_clear();

        let report = ShutdownReport {
            failures: self.failures.load(Ordering::Acquire),
            cancelled: self.coord.cancel.is_cancelled(),
        };
        info!(target: "smp", "all workers done, failures {:#06b}", report.failures);
        Ok(report)
    }

    fn work(&self, core: CoreId) -> Result<(), DispatchError> {
        self.coord.set_state(core, CoreState::WaitingForBoot);
        self.coord.gate.wait();
        self.coord.set_state(core, CoreState::Dispatching);

        let mut idle = Idle;
        let workload: &mut dyn Runnable = match self.table.take(core) {
            Some(w) => w,
            None => &mut idle,
        };

        self.coord.set_state(core, CoreState::RunningWorkload);
        let ctx = WorkloadContext {
            core,
            cancel: &self.coord.cancel,
        };
        if let Err(e) = workload.run(&ctx) {
            error!(target: "smp", "core {} {:?} failed: {}", core.index(), workload.kind(), e);
            self.failures.fetch_or(core.bit(), Ordering::Release);
        }

        self.coord.set_state(core, CoreState::Completed);
        self.coord.mask.complete(core)
    }
}
