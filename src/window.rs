//! Circular dictionary window shared by match copying and caller reads.
//!
//! The window doubles as the output buffer: every decoded byte lands here
//! first, and the caller drains it through [`read_pending`]. Decode keeps
//! at most `pending` undelivered bytes in the buffer, so match distances
//! always resolve against bytes that were really produced.
//!
//! ```text
//!          size = 8
//!   +---+---+---+---+---+---+---+---+
//!   | f | g | b | c | d | e |   |   |   is_full = true after first wrap
//!   +---+---+---+---+---+---+---+---+
//!             ^pos (next write)
//!   get_byte(1) = g, get_byte(6) = b
//! ```
//!
//! [`read_pending`]: Window::read_pending

use std::io;
use std::io::Read;

/// Sliding dictionary with a cursor for undelivered output.
pub(crate) struct Window {
    buf: Box<[u8]>,
    /// Next write index, in `0..size`.
    pos: u32,
    size: u32,
    /// True once the window wrapped at least once.
    is_full: bool,
    /// Monotonic count of bytes ever produced. Feeds position-conditioned
    /// probability contexts, so it must keep counting across wraps.
    total: u64,
    /// Decoded bytes not yet handed to the caller, always `<= size`.
    pending: u32,
}

impl Window {
    pub(crate) fn new(dict_size: u32) -> Self {
        Self {
            buf: vec![0u8; dict_size as usize].into_boxed_slice(),
            pos: 0,
            size: dict_size,
            is_full: false,
            total: 0,
            pending: 0,
        }
    }

    /// Forgets all history, keeping the allocation. LZMA2 dictionary reset.
    pub(crate) fn reset(&mut self) {
        self.pos = 0;
        self.is_full = false;
        self.total = 0;
        self.pending = 0;
    }

    #[inline]
    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    #[inline]
    pub(crate) fn pending(&self) -> u32 {
        self.pending
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.pos == 0 && !self.is_full
    }

    /// True when a 1-based distance refers to bytes the window still holds.
    #[inline]
    pub(crate) fn check_distance(&self, dist: u32) -> bool {
        dist <= self.size && (dist <= self.pos || self.is_full)
    }

    #[inline]
    pub(crate) fn put_byte(&mut self, b: u8) {
        self.buf[self.pos as usize] = b;
        self.pos += 1;
        if self.pos == self.size {
            self.pos = 0;
            self.is_full = true;
        }
        self.pending += 1;
        self.total += 1;
    }

    /// Byte at 1-based distance `dist` behind the write cursor. Callers
    /// validate with [`check_distance`](Self::check_distance) first.
    #[inline]
    pub(crate) fn get_byte(&self, dist: u32) -> u8 {
        let i = if dist <= self.pos {
            self.pos - dist
        } else {
            self.size - dist + self.pos
        };
        self.buf[i as usize]
    }

    /// Copies `len` bytes from 1-based distance `dist`. Byte at a time:
    /// when `len > dist` the copy overlaps its own output and must observe
    /// the bytes it just wrote.
    pub(crate) fn copy_match(&mut self, dist: u32, len: u32) {
        for _ in 0..len {
            self.put_byte(self.get_byte(dist));
        }
    }

    /// Drains up to `out.len()` undelivered bytes, oldest first.
    pub(crate) fn read_pending(&mut self, out: &mut [u8]) -> usize {
        let n = (out.len() as u64).min(self.pending as u64) as u32;
        if n == 0 {
            return 0;
        }
        let start = if self.pending <= self.pos {
            self.pos - self.pending
        } else {
            self.size - (self.pending - self.pos)
        };
        let first = n.min(self.size - start);
        out[..first as usize]
            .copy_from_slice(&self.buf[start as usize..(start + first) as usize]);
        if n > first {
            out[first as usize..n as usize]
                .copy_from_slice(&self.buf[..(n - first) as usize]);
        }
        self.pending -= n;
        n as usize
    }

    /// Reads raw bytes from `input` straight into the window, for
    /// uncompressed LZMA2 chunks. Fills at most one contiguous span, so a
    /// single call may return less than `max`; returns the bytes consumed.
    pub(crate) fn fill_from<R: Read>(&mut self, input: &mut R, max: u32) -> io::Result<u32> {
        let span = max.min(self.size - self.pos);
        if span == 0 {
            return Ok(0);
        }
        let end = (self.pos + span) as usize;
        let n = loop {
            match input.read(&mut self.buf[self.pos as usize..end]) {
                Ok(n) => break n as u32,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.pos += n;
        if self.pos == self.size {
            self.pos = 0;
            self.is_full = true;
        }
        self.pending += n;
        self.total += n as u64;
        Ok(n)
    }
}
