//! V3D Identity Check
//!
//! Brings the 3D block up through the firmware (clock plus QPU enable) and
//! confirms the hardware behind the register window is the expected V3D
//! revision. Nothing else may touch GPU memory or V3D registers unless this
//! check passes.

use core::fmt;

use log::{info, warn};

use crate::config::V3dInitConfig;
use crate::error::MailboxError;
use crate::mailbox::{self, tag, PropertyChannel, TAG_HEADER_WORDS};

/// IDENT0 of a VideoCore IV V3D: "V3D", technology version 2
pub const V3D_IDENT0_MAGIC: u32 = 0x0244_3356;

/// V3D register offsets, as word indices into the register window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum V3dReg {
    /// Block identity
    Ident0 = 0x000 >> 2,
    /// Configuration A
    Ident1 = 0x004 >> 2,
    /// Configuration B
    Ident2 = 0x008 >> 2,
    Scratch = 0x010 >> 2,

    L2cactl = 0x020 >> 2,
    Slcactl = 0x024 >> 2,

    Intctl = 0x030 >> 2,
    Intena = 0x034 >> 2,
    Intdis = 0x038 >> 2,

    // Control list executor threads
    Ct0cs = 0x100 >> 2,
    Ct1cs = 0x104 >> 2,
    Ct0ea = 0x108 >> 2,
    Ct1ea = 0x10C >> 2,
    Ct0ca = 0x110 >> 2,
    Ct1ca = 0x114 >> 2,
    Ct0ra0 = 0x118 >> 2,
    Ct1ra0 = 0x11C >> 2,
    Ct0lc = 0x120 >> 2,
    Ct1lc = 0x124 >> 2,
    Ct0pc = 0x128 >> 2,
    Ct1pc = 0x12C >> 2,

    Pcs = 0x130 >> 2,
    Bfc = 0x134 >> 2,
    Rfc = 0x138 >> 2,

    // Binning memory pool
    Bpca = 0x300 >> 2,
    Bpcs = 0x304 >> 2,
    Bpoa = 0x308 >> 2,
    Bpos = 0x30C >> 2,
    Bxcf = 0x310 >> 2,

    // QPU scheduler
    Sqrsv0 = 0x410 >> 2,
    Sqrsv1 = 0x414 >> 2,
    Sqcntl = 0x418 >> 2,
    Srqpc = 0x430 >> 2,
    Srqua = 0x434 >> 2,
    Srqul = 0x438 >> 2,
    Srqcs = 0x43C >> 2,

    Vpacntl = 0x500 >> 2,
    Vpmbase = 0x504 >> 2,

    Pctrc = 0x670 >> 2,
    Pctre = 0x674 >> 2,

    Dbge = 0xF00 >> 2,
    Errstat = 0xF20 >> 2,
}

impl V3dReg {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Byte offset from the window base
    #[inline]
    pub const fn offset(self) -> usize {
        self.index() * 4
    }
}

/// Read access to the V3D register block
pub trait RegisterWindow {
    /// Live register value; implementations must not cache
    fn read(&self, reg: V3dReg) -> u32;
}

/// Decoded IDENT0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3dIdent {
    /// Three ASCII id characters, "V3D" on real hardware
    pub id: [u8; 3],
    pub tech_version: u8,
}

impl V3dIdent {
    pub const fn decode(ident0: u32) -> Self {
        let b = ident0.to_le_bytes();
        Self {
            id: [b[0], b[1], b[2]],
            tech_version: b[3],
        }
    }
}

impl fmt::Display for V3dIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in &self.id {
            if c.is_ascii_graphic() {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{:02x}", c)?;
            }
        }
        write!(f, " v{}", self.tech_version)
    }
}

/// Request the V3D clock and QPU enable, then check IDENT0
///
/// The firmware round trip is best effort: its failure is logged and
/// otherwise ignored. Only the register comparison decides the result.
pub fn verify_identity<C, W>(channel: &mut C, window: &W, cfg: &V3dInitConfig) -> bool
where
    C: PropertyChannel + ?Sized,
    W: RegisterWindow + ?Sized,
{
    if let Err(e) = power_up(channel, cfg) {
        warn!(target: "v3d", "clock/QPU enable request failed: {}", e);
    }

    let ident0 = window.read(V3dReg::Ident0);
    let ident = V3dIdent::decode(ident0);

    if ident0 != V3D_IDENT0_MAGIC {
        warn!(target: "v3d", "IDENT0 {:#010x} ({}) is not a VideoCore IV V3D", ident0, ident);
        return false;
    }

    info!(target: "v3d", "{} found, clock {} Hz requested", ident, cfg.rate_hz);
    true
}

fn power_up<C>(channel: &mut C, cfg: &V3dInitConfig) -> Result<(), MailboxError>
where
    C: PropertyChannel + ?Sized,
{
    // SET_CLOCK_RATE(3 words) + ENABLE_QPU(1 word)
    let mut buf = [0u32; 2 * TAG_HEADER_WORDS + 4];
    let mut used = mailbox::write_tag(&mut buf, tag::SET_CLOCK_RATE, &[cfg.clock_id, cfg.rate_hz, 0], 2)?;
    used += mailbox::write_tag(&mut buf[used..], tag::ENABLE_QPU, &[1], 1)?;

    channel.submit(&mut buf[..used])
}
