// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Staging buffer (writer) and read window (reader).
//!
//! Both map a contiguous range of absolute stream offsets onto a bounded
//! in-memory buffer. The writer keeps placeholders of unresolved size
//! prefixes in the staging buffer until flush time, where they are patched
//! in place.

use std::io::{self, Read, Seek, SeekFrom};

/// Generate native-endian write methods on an archive (eliminates duplication)
///
/// Each generated method encodes the value into a stack array through
/// `byteorder::NativeEndian` and forwards it to `write_bytes`.
macro_rules! impl_write_ne {
    ($($name:ident => $type:ty, $size:expr, $encode:ident;)*) => {$(
        pub fn $name(&mut self, value: $type) -> Result<()> {
            let mut bytes = [0u8; $size];
            NativeEndian::$encode(&mut bytes, value);
            self.write_bytes(&bytes)
        }
    )*};
}

/// Generate native-endian read methods on an archive (eliminates duplication)
///
/// Each generated method reads exactly `$size` bytes through `read_exact`
/// (which enforces record and stream bounds) and decodes them.
macro_rules! impl_read_ne {
    ($($name:ident => $type:ty, $size:expr, $decode:ident;)*) => {$(
        pub fn $name(&mut self) -> Result<$type> {
            let mut bytes = [0u8; $size];
            self.read_exact(&mut bytes)?;
            Ok(NativeEndian::$decode(&bytes))
        }
    )*};
}

/// Bounded staging buffer mirroring the stream range `[origin, origin + len)`.
#[derive(Debug)]
pub(crate) struct StagingBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    origin: u64,
}

impl StagingBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            origin: 0,
        }
    }

    /// Drop staged bytes and restart at `origin`.
    pub(crate) fn reset(&mut self, origin: u64) {
        self.bytes.clear();
        self.origin = origin;
    }

    pub(crate) fn origin(&self) -> u64 {
        self.origin
    }

    /// Absolute stream offset of the next staged byte.
    pub(crate) fn position(&self) -> u64 {
        self.origin + self.bytes.len() as u64
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True if `len` more bytes fit without flushing.
    pub(crate) fn fits(&self, len: usize) -> bool {
        self.bytes.len() + len <= self.capacity
    }

    pub(crate) fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// True if the 8 bytes at absolute `offset` are still staged.
    pub(crate) fn holds(&self, offset: u64) -> bool {
        offset >= self.origin && offset + 8 <= self.position()
    }

    /// Overwrite a staged placeholder. Caller checks `holds` first.
    pub(crate) fn patch(&mut self, offset: u64, image: &[u8; 8]) {
        let at = (offset - self.origin) as usize;
        self.bytes[at..at + 8].copy_from_slice(image);
    }

    /// Mark the staged bytes (plus `bypassed` directly written bytes) as
    /// flushed.
    pub(crate) fn advance(&mut self, bypassed: u64) {
        self.origin += self.bytes.len() as u64 + bypassed;
        self.bytes.clear();
    }
}

/// Read window caching the stream range `[start, start + len)`.
#[derive(Debug)]
pub(crate) struct ReadWindow {
    bytes: Vec<u8>,
    capacity: usize,
    start: u64,
}

impl ReadWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::new(),
            capacity,
            start: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
        self.start = 0;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached bytes starting at absolute `pos` (empty if not cached).
    pub(crate) fn available(&self, pos: u64) -> &[u8] {
        let end = self.start + self.bytes.len() as u64;
        if pos < self.start || pos >= end {
            return &[];
        }
        &self.bytes[(pos - self.start) as usize..]
    }

    /// Load up to `capacity` bytes starting at absolute `pos`.
    ///
    /// Returns the number of bytes cached; 0 means end of stream.
    pub(crate) fn refill<S: Read + Seek + ?Sized>(&mut self, source: &mut S, pos: u64) -> io::Result<usize> {
        source.seek(SeekFrom::Start(pos))?;
        self.bytes.resize(self.capacity, 0);
        self.start = pos;
        let mut filled = 0;
        while filled < self.capacity {
            match source.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.bytes.clear();
                    return Err(e);
                }
            }
        }
        self.bytes.truncate(filled);
        Ok(filled)
    }
}
