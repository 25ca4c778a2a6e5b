//! Error types for the mailbox, GPU memory, dispatch and workload layers

use thiserror::Error;

use crate::dispatch::WorkloadKind;

/// Mailbox protocol failures
///
/// Callers that only need the opaque "firmware did not service this"
/// answer can treat every variant alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// Tag layout disagrees with the buffer length
    #[error("malformed tag buffer")]
    Malformed,
    /// Property buffer not 16-byte aligned
    #[error("property buffer not 16-byte aligned")]
    NotAligned,
    /// Buffer-level response code was not success
    #[error("firmware rejected request (code {0:#010x})")]
    RequestFailed(u32),
    /// Firmware left a tag without its response bit
    #[error("tag {0:#010x} not answered")]
    TagUnanswered(u32),
    /// No reply from the firmware
    #[error("mailbox timeout")]
    Timeout,
}

/// GPU memory manager failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("mailbox: {0}")]
    Mailbox(#[from] MailboxError),
    /// Allocation answered with handle 0
    #[error("allocation returned a zero handle")]
    ZeroHandle,
    /// Lock answered with bus address 0
    #[error("lock returned a zero bus address")]
    ZeroAddress,
    /// Unlock or release answered with a nonzero status word
    #[error("firmware status {0}")]
    Status(u32),
}

/// Core table and rendezvous failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("core {0} out of range")]
    InvalidCore(u8),
    /// Core 0 coordinates and never takes a workload
    #[error("coordinator core cannot take a workload")]
    CoordinatorAssigned,
    #[error("core {0} assigned twice")]
    DuplicateCore(u8),
    #[error("{0:?} workload assigned to more than one core")]
    WorkloadReused(WorkloadKind),
    #[error("core {0} already completed")]
    AlreadyCompleted(u8),
    #[error("boot gate already open")]
    GateAlreadyOpen,
}

/// Terminal failure of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorkloadError {
    #[error("gpu: {0}")]
    Gpu(#[from] GpuError),
    #[error("cannot bind to port {port} (error {code})")]
    Bind { port: u16, code: i32 },
}
