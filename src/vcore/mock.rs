//! Test doubles for the platform traits

use std::collections::VecDeque;
use std::string::{String, ToString};
use std::format;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::vec::Vec;

use log::{LevelFilter, Log, Metadata, Record};

use crate::address::to_bus_address_with;
use crate::collab::{Clock, LineSink, Transport, Yield};
use crate::coord::CancelToken;
use crate::error::MailboxError;
use crate::gpu_mem::MemFlags;
use crate::identity::{RegisterWindow, V3dReg};
use crate::mailbox::{self, tag, PropertyChannel, RESPONSE_BIT, TAG_HEADER_WORDS};

const REQUEST_FAILED: u32 = 0x8000_0001;

/// Word indices of each tag header in a validated sequence
fn tag_offsets(tags: &[u32]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut index = 0;
    while index < tags.len() && tags[index] != tag::END {
        offsets.push(index);
        index += TAG_HEADER_WORDS + tags[index + 1] as usize / 4;
    }
    offsets
}

fn answer(tags: &mut [u32], index: usize, values: &[u32], len_bytes: u32) {
    let start = index + TAG_HEADER_WORDS;
    let room = tags[index + 1] as usize / 4;
    for (slot, value) in tags[start..start + room].iter_mut().zip(values) {
        *slot = *value;
    }
    tags[index + 2] = RESPONSE_BIT | len_bytes;
}

// ============================================================================
// Firmware
// ============================================================================

/// Always succeeds with a fixed handle and bus address
pub(crate) struct FixedFirmware {
    handle: u32,
    bus: u32,
    fail: bool,
    requests: usize,
    last: Vec<u32>,
}

impl FixedFirmware {
    pub(crate) fn new(handle: u32, bus: u32) -> Self {
        Self {
            handle,
            bus,
            fail: false,
            requests: 0,
            last: Vec::new(),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0, 0)
        }
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests
    }

    pub(crate) fn last_request(&self) -> &[u32] {
        &self.last
    }
}

impl PropertyChannel for FixedFirmware {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        self.requests += 1;
        self.last = tags.to_vec();
        mailbox::validate(tags)?;

        if self.fail {
            return Err(MailboxError::RequestFailed(REQUEST_FAILED));
        }

        for index in tag_offsets(tags) {
            let value = match tags[index] {
                tag::MEM_ALLOCATE => self.handle,
                tag::MEM_LOCK => self.bus,
                _ => 0,
            };
            answer(tags, index, &[value], 4);
        }
        mailbox::complete(tags)
    }
}

struct Allocation {
    handle: u32,
    phys: u32,
    flags: MemFlags,
    locked: bool,
}

/// Firmware allocator simulation with its own handle table
pub(crate) struct SimFirmware {
    allocations: Vec<Allocation>,
    next_handle: u32,
    next_phys: u32,
    limit: u32,
    command_line: String,
    clock_rates: Vec<(u32, u32)>,
    qpu_enabled: bool,
    refused: Vec<u32>,
    requests: usize,
}

impl SimFirmware {
    const GPU_MEM_BASE: u32 = 0x1E00_0000;
    const GPU_MEM_SIZE: u32 = 0x0200_0000;

    pub(crate) fn new() -> Self {
        Self::with_capacity(Self::GPU_MEM_SIZE)
    }

    pub(crate) fn with_capacity(bytes: u32) -> Self {
        Self {
            allocations: Vec::new(),
            next_handle: 1,
            next_phys: Self::GPU_MEM_BASE,
            limit: Self::GPU_MEM_BASE + bytes,
            command_line: String::new(),
            clock_rates: Vec::new(),
            qpu_enabled: false,
            refused: Vec::new(),
            requests: 0,
        }
    }

    pub(crate) fn with_command_line(mut self, line: &str) -> Self {
        self.command_line = line.to_string();
        self
    }

    /// Leave this tag unanswered from now on
    pub(crate) fn refuse(mut self, id: u32) -> Self {
        self.refused.push(id);
        self
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub(crate) fn clock_rate(&self, id: u32) -> Option<u32> {
        self.clock_rates.iter().find(|(c, _)| *c == id).map(|(_, r)| *r)
    }

    pub(crate) fn qpu_enabled(&self) -> bool {
        self.qpu_enabled
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests
    }

    fn allocate(&mut self, size: u32, alignment: u32, flags: u32) -> u32 {
        let align = alignment.max(1);
        let phys = self.next_phys.div_ceil(align) * align;
        let Some(end) = phys.checked_add(size) else {
            return 0;
        };
        if size == 0 || end > self.limit {
            return 0;
        }

        let handle = self.next_handle;
        self.next_handle += 1;
        self.next_phys = end;
        self.allocations.push(Allocation {
            handle,
            phys,
            flags: MemFlags::from_bits_truncate(flags),
            locked: false,
        });
        handle
    }

    fn find(&mut self, handle: u32) -> Option<&mut Allocation> {
        self.allocations.iter_mut().find(|a| a.handle == handle)
    }
}

impl PropertyChannel for SimFirmware {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        self.requests += 1;
        mailbox::validate(tags)?;

        for index in tag_offsets(tags) {
            let id = tags[index];
            if self.refused.contains(&id) {
                continue;
            }
            let args = &tags[index + TAG_HEADER_WORDS..];

            match id {
                tag::MEM_ALLOCATE => {
                    let handle = self.allocate(args[0], args[1], args[2]);
                    answer(tags, index, &[handle], 4);
                }
                tag::MEM_LOCK => {
                    let bus = match self.find(args[0]) {
                        Some(a) => {
                            a.locked = true;
                            to_bus_address_with(a.phys as usize, a.flags.alias())
                        }
                        None => 0,
                    };
                    answer(tags, index, &[bus], 4);
                }
                tag::MEM_UNLOCK => {
                    let status = match self.find(args[0]) {
                        Some(a) if a.locked => {
                            a.locked = false;
                            0
                        }
                        _ => 1,
                    };
                    answer(tags, index, &[status], 4);
                }
                tag::MEM_RELEASE => {
                    let handle = args[0];
                    let before = self.allocations.len();
                    self.allocations.retain(|a| a.handle != handle);
                    let status = if self.allocations.len() < before { 0 } else { 1 };
                    answer(tags, index, &[status], 4);
                }
                tag::SET_CLOCK_RATE => {
                    let (clock, rate) = (args[0], args[1]);
                    self.clock_rates.retain(|(c, _)| *c != clock);
                    self.clock_rates.push((clock, rate));
                    answer(tags, index, &[clock, rate], 8);
                }
                tag::GET_CLOCK_RATE => {
                    let clock = args[0];
                    let rate = self.clock_rate(clock).unwrap_or(0);
                    answer(tags, index, &[clock, rate], 8);
                }
                tag::ENABLE_QPU => {
                    self.qpu_enabled = args[0] != 0;
                    answer(tags, index, &[0], 4);
                }
                tag::GET_COMMAND_LINE => {
                    let bytes = self.command_line.as_bytes();
                    let words: Vec<u32> = bytes
                        .chunks(4)
                        .map(|c| {
                            let mut w = [0u8; 4];
                            w[..c.len()].copy_from_slice(c);
                            u32::from_ne_bytes(w)
                        })
                        .collect();
                    answer(tags, index, &words, bytes.len() as u32);
                }
                _ => {}
            }
        }
        mailbox::complete(tags)
    }
}

// ============================================================================
// Registers
// ============================================================================

/// Register window with a fixed IDENT0 and zeros elsewhere
pub(crate) struct FixedRegisters {
    pub(crate) ident0: u32,
}

impl RegisterWindow for FixedRegisters {
    fn read(&self, reg: V3dReg) -> u32 {
        match reg {
            V3dReg::Ident0 => self.ident0,
            _ => 0,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Line sink that keeps what it was given
#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) lines: Vec<String>,
}

impl LineSink for MemorySink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Transport that replays a script, then cancels
pub(crate) struct ScriptedTransport<'a> {
    pub(crate) bind_result: Result<(), i32>,
    pub(crate) bound_port: Option<u16>,
    script: VecDeque<Result<Vec<u8>, i32>>,
    cancel_when_done: Option<&'a CancelToken>,
    pub(crate) receives: usize,
}

impl<'a> ScriptedTransport<'a> {
    pub(crate) fn new(script: Vec<Result<Vec<u8>, i32>>, cancel_when_done: &'a CancelToken) -> Self {
        Self {
            bind_result: Ok(()),
            bound_port: None,
            script: script.into(),
            cancel_when_done: Some(cancel_when_done),
            receives: 0,
        }
    }
}

impl Transport for ScriptedTransport<'_> {
    fn bind(&mut self, port: u16) -> Result<(), i32> {
        self.bind_result?;
        self.bound_port = Some(port);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        self.receives += 1;
        match self.script.pop_front() {
            Some(Ok(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Err(code)) => Err(code),
            None => {
                if let Some(token) = self.cancel_when_done {
                    token.cancel();
                }
                Ok(0)
            }
        }
    }
}

/// Clock that advances a fixed step on every read
pub(crate) struct StepClock {
    now: AtomicU64,
    step: u64,
}

impl StepClock {
    pub(crate) fn new(step: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step,
        }
    }
}

impl Clock for StepClock {
    fn millis(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::Relaxed)
    }
}

/// Yield that counts calls
#[derive(Default)]
pub(crate) struct CountingYield {
    pub(crate) count: usize,
}

impl Yield for CountingYield {
    fn yield_now(&mut self) {
        self.count += 1;
    }
}

// ============================================================================
// Concurrency
// ============================================================================

/// Firmware that counts `submit` calls entered while another was in flight
#[derive(Default)]
pub(crate) struct OverlapFirmware {
    in_flight: AtomicBool,
    pub(crate) overlaps: AtomicUsize,
    pub(crate) calls: AtomicUsize,
}

impl PropertyChannel for &OverlapFirmware {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.calls.fetch_add(1, Ordering::Relaxed);
        // Widen the window a concurrent caller could hit
        for _ in 0..64 {
            std::hint::spin_loop();
        }
        std::thread::yield_now();

        for index in tag_offsets(tags) {
            answer(tags, index, &[0], 4);
        }
        self.in_flight.store(false, Ordering::Release);
        mailbox::complete(tags)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Process-wide `log` backend recording `"<target>: <message>"` lines
pub(crate) struct CapturedLog {
    lines: Mutex<Vec<String>>,
}

static CAPTURED: CapturedLog = CapturedLog {
    lines: Mutex::new(Vec::new()),
};

impl CapturedLog {
    /// Install the backend on first use; records from every test land here
    pub(crate) fn install() -> &'static Self {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&CAPTURED);
            log::set_max_level(LevelFilter::Trace);
        });
        &CAPTURED
    }

    pub(crate) fn contains(&self, line: &str) -> bool {
        self.lines.lock().map(|lines| lines.iter().any(|l| l == line)).unwrap_or(false)
    }
}

impl Log for CapturedLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{}: {}", record.target(), record.args()));
        }
    }

    fn flush(&self) {}
}
