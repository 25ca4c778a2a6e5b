//! VideoCore Property Tag Protocol
//!
//! Requests to the firmware are sequences of 32-bit tags. The channel
//! overwrites each tag's value buffer in place with the response.
//!
//! # Tag Format
//!
//! ```text
//! Word  Description
//! ──────────────────────────────────────────────
//! 0     Tag ID
//! 1     Value buffer size (bytes, max of request/response)
//! 2     Request size (bytes); firmware sets bit 31 on response
//! 3..   Value buffer
//! ```
//!
//! A sequence may end with [`tag::END`]. The platform channel adds the
//! buffer header (total size, request code) and the trailing end tag
//! itself, so callers only deal with tags.

use log::{debug, trace};
use spin::{Mutex, MutexGuard};

use crate::error::MailboxError;

/// Set by the firmware in word 2 of every tag it answered
pub const RESPONSE_BIT: u32 = 0x8000_0000;

/// Tag ID, value size, request size
pub const TAG_HEADER_WORDS: usize = 3;

/// Largest value buffer [`request`] can carry
pub const MAX_VALUE_WORDS: usize = 8;

/// Command line value buffer (bytes)
const COMMAND_LINE_BYTES: usize = 256;

// ============================================================================
// Property Tags
// ============================================================================

/// Property tag IDs
pub mod tag {
    // Clocks
    pub const GET_CLOCK_RATE: u32 = 0x0003_0002;
    pub const SET_CLOCK_RATE: u32 = 0x0003_8002;

    // GPU memory
    pub const MEM_ALLOCATE: u32 = 0x0003_000C;
    pub const MEM_LOCK: u32 = 0x0003_000D;
    pub const MEM_UNLOCK: u32 = 0x0003_000E;
    pub const MEM_RELEASE: u32 = 0x0003_000F;

    // QPU
    pub const ENABLE_QPU: u32 = 0x0003_0012;

    // Config
    pub const GET_COMMAND_LINE: u32 = 0x0005_0001;

    /// End tag (terminates tag list)
    pub const END: u32 = 0x0000_0000;
}

/// Clock IDs for clock rate tags
pub mod clock {
    pub const EMMC: u32 = 0x1;
    pub const UART: u32 = 0x2;
    pub const ARM: u32 = 0x3;
    pub const CORE: u32 = 0x4;
    pub const V3D: u32 = 0x5;
    pub const H264: u32 = 0x6;
    pub const ISP: u32 = 0x7;
    pub const SDRAM: u32 = 0x8;
}

// ============================================================================
// Channel
// ============================================================================

/// A synchronous request/response channel to the firmware
///
/// `submit` blocks until the firmware answers. On `Ok` every tag's value
/// buffer holds the response and its response bit has been stripped (see
/// [`complete`]). On `Err` the value buffers are undefined.
///
/// Implementations are not reentrant. Wrap one in [`SerializedChannel`]
/// before sharing it between cores.
pub trait PropertyChannel {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError>;
}

impl<C: PropertyChannel + ?Sized> PropertyChannel for &mut C {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        (**self).submit(tags)
    }
}

/// A channel that several cores may use, one request at a time
pub struct SerializedChannel<C> {
    inner: Mutex<C>,
}

impl<C> SerializedChannel<C> {
    pub const fn new(channel: C) -> Self {
        Self {
            inner: Mutex::new(channel),
        }
    }

    /// Hold the channel across several requests
    pub fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock()
    }
}

impl<C: PropertyChannel> PropertyChannel for &SerializedChannel<C> {
    fn submit(&mut self, tags: &mut [u32]) -> Result<(), MailboxError> {
        self.inner.lock().submit(tags)
    }
}

// ============================================================================
// Tag Layout
// ============================================================================

/// Lay out one tag at the start of `buf`
///
/// The value buffer is sized for the larger of the request and the
/// expected response and zero-filled past the request words. Returns the
/// number of words used.
pub fn write_tag(
    buf: &mut [u32],
    id: u32,
    request: &[u32],
    response_words: usize,
) -> Result<usize, MailboxError> {
    let value_words = request.len().max(response_words);
    let used = TAG_HEADER_WORDS + value_words;
    if buf.len() < used {
        return Err(MailboxError::Malformed);
    }

    buf[0] = id;
    buf[1] = (value_words * 4) as u32;
    buf[2] = (request.len() * 4) as u32;

    let value = &mut buf[TAG_HEADER_WORDS..used];
    value[..request.len()].copy_from_slice(request);
    value[request.len()..].fill(0);

    Ok(used)
}

/// Walk a tag sequence, calling `f` with the word index of each tag header
fn walk(
    tags: &[u32],
    mut f: impl FnMut(usize) -> Result<(), MailboxError>,
) -> Result<usize, MailboxError> {
    let mut index = 0;
    let mut count = 0;

    while index < tags.len() {
        if tags[index] == tag::END {
            break;
        }
        if index + TAG_HEADER_WORDS > tags.len() {
            return Err(MailboxError::Malformed);
        }

        let value_size = tags[index + 1] as usize;
        if value_size % 4 != 0 {
            return Err(MailboxError::Malformed);
        }

        let next = index + TAG_HEADER_WORDS + value_size / 4;
        if next > tags.len() {
            return Err(MailboxError::Malformed);
        }

        f(index)?;
        count += 1;
        index = next;
    }

    if count == 0 {
        return Err(MailboxError::Malformed);
    }
    Ok(count)
}

/// Check that a tag sequence is well formed; returns the number of tags
pub fn validate(tags: &[u32]) -> Result<usize, MailboxError> {
    walk(tags, |_| Ok(()))
}

/// Accept a firmware reply in place
///
/// Every tag must carry the response bit; it is cleared so word 2 holds
/// the response length in bytes.
pub fn complete(tags: &mut [u32]) -> Result<(), MailboxError> {
    // Check every tag before touching the buffer.
    let count = walk(tags, |index| {
        if tags[index + 2] & RESPONSE_BIT == 0 {
            return Err(MailboxError::TagUnanswered(tags[index]));
        }
        Ok(())
    })?;

    let mut index = 0;
    for _ in 0..count {
        tags[index + 2] &= !RESPONSE_BIT;
        index += TAG_HEADER_WORDS + tags[index + 1] as usize / 4;
    }
    Ok(())
}

// ============================================================================
// Requests
// ============================================================================

/// Send a single-tag request and return the first `N` value words of the response
pub fn request<C, const N: usize>(
    channel: &mut C,
    id: u32,
    args: &[u32],
) -> Result<[u32; N], MailboxError>
where
    C: PropertyChannel + ?Sized,
{
    const { assert!(N <= MAX_VALUE_WORDS) };

    let mut buf = [0u32; TAG_HEADER_WORDS + MAX_VALUE_WORDS];
    let used = write_tag(&mut buf, id, args, N)?;

    match channel.submit(&mut buf[..used]) {
        Ok(()) => trace!(target: "mailbox", "tag {:#010x} answered", id),
        Err(e) => {
            debug!(target: "mailbox", "tag {:#010x} failed: {}", id, e);
            return Err(e);
        }
    }

    let mut out = [0u32; N];
    out.copy_from_slice(&buf[TAG_HEADER_WORDS..TAG_HEADER_WORDS + N]);
    Ok(out)
}

/// Read the firmware command line (cmdline.txt) into `out`
pub fn get_command_line<'a, C>(channel: &mut C, out: &'a mut [u8]) -> Result<&'a str, MailboxError>
where
    C: PropertyChannel + ?Sized,
{
    const VALUE_WORDS: usize = COMMAND_LINE_BYTES / 4;

    let mut buf = [0u32; TAG_HEADER_WORDS + VALUE_WORDS];
    let used = write_tag(&mut buf, tag::GET_COMMAND_LINE, &[], VALUE_WORDS)?;
    channel.submit(&mut buf[..used])?;

    let reported = (buf[2] as usize).min(COMMAND_LINE_BYTES);
    let mut len = 0;
    for word in &buf[TAG_HEADER_WORDS..used] {
        for byte in word.to_ne_bytes() {
            if len >= reported || len >= out.len() {
                break;
            }
            out[len] = byte;
            len += 1;
        }
    }

    let end = out[..len].iter().position(|&b| b == 0).unwrap_or(len);
    core::str::from_utf8(&out[..end]).map_err(|_| MailboxError::Malformed)
}

#[cfg(test)]
mod tests_prop;
