//! # vcore - VideoCore Mailbox Channel and Four-Core Dispatch
//!
//! The platform-agnostic half of the Pi Zero 2W kernel. Everything that
//! touches hardware or an external service is abstracted behind a trait,
//! so the protocol and synchronization logic runs unchanged on the board
//! and on the host test harness.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Workloads                          │
//! │           gpu_demo, net_recv, Idle                   │
//! ├─────────────────────────────────────────────────────┤
//! │        Dispatch              │     GPU services      │
//! │   coord, dispatch            │  gpu_mem, identity    │
//! ├─────────────────────────────────────────────────────┤
//! │                    Protocol                          │
//! │             mailbox (tag buffers)                    │
//! ├─────────────────────────────────────────────────────┤
//! │                     Leaves                           │
//! │          address, collab, config, logging            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Platform Traits
//!
//! - [`PropertyChannel`] - firmware mailbox round trip
//! - [`RegisterWindow`] - V3D register reads
//! - [`LineSink`], [`Transport`], [`Yield`], [`Clock`] - workload collaborators

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]

pub mod address;
pub mod collab;
pub mod config;
pub mod coord;
pub mod dispatch;
pub mod error;
pub mod gpu_mem;
pub mod identity;
pub mod logging;
pub mod mailbox;
pub mod workload;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports for convenience
pub use address::{to_bus_address, to_bus_address_with, to_processor_address, Alias, BusAddress};
pub use collab::{Clock, LineSink, Transport, Yield};
pub use config::{KernelConfig, KernelOptions};
pub use coord::{BootGate, CancelToken, CompletionMask, CoreCoordination, CoreId, CoreState, MAX_CORES};
pub use dispatch::{
    Assignment, DispatchTable, Dispatcher, Idle, Runnable, ShutdownReport,
    WorkloadContext, WorkloadKind, Workloads,
};
pub use error::{DispatchError, GpuError, MailboxError, WorkloadError};
pub use gpu_mem::{GpuMemory, MemFlags, MemHandle};
pub use identity::{verify_identity, RegisterWindow, V3dIdent, V3dReg, V3D_IDENT0_MAGIC};
pub use mailbox::{PropertyChannel, SerializedChannel};
pub use workload::gpu_demo::{DemoFailure, DemoReport, GpuDemo};
pub use workload::net_recv::{ReceiveLoop, ReceiveStats};
