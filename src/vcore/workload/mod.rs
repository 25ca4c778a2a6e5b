//! Per-core workloads
//!
//! - [`gpu_demo`] - allocate, lock and report a GPU buffer
//! - [`net_recv`] - datagram receive loop with a periodic uptime line
//!
//! Idle cores run [`crate::dispatch::Idle`].

pub mod gpu_demo;
pub mod net_recv;
