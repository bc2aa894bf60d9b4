// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive constants and per-archive configuration.

/// Stream prologue magic.
pub const MAGIC: u16 = 0x7966;

/// Current archive layout version (low 12 bits of the version word).
pub const FORMAT_VERSION: u16 = 3;

/// Bits of the version word holding the format version.
pub const VERSION_MASK: u16 = 0x0fff;

/// Shift of the 4-bit producer tag inside the version word.
pub const PRODUCER_TAG_SHIFT: u16 = 12;

/// Default staging buffer capacity (64 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Member name used for the top-level value of a stream.
pub const ROOT_NAME: &str = "#root";

/// Writer/reader configuration.
///
/// # Example
///
/// ```
/// use starch::ArchiveConfig;
///
/// let config = ArchiveConfig::new()
///     .buffer_capacity(4096)
///     .producer_tag(2)
///     .force_safe(true);
/// assert_eq!(config.version_word() >> 12, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Staging buffer capacity in bytes (writer) / read window size (reader).
    pub buffer_capacity: usize,
    /// 4-bit tag identifying the producing tool, stored in the version word.
    pub producer_tag: u8,
    /// Always decode reflected objects through the positional search,
    /// even when the stored layout matches.
    pub force_safe: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            producer_tag: 0,
            force_safe: false,
        }
    }
}

impl ArchiveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staging buffer capacity (clamped to at least 16 bytes).
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(16);
        self
    }

    /// Set the producer tag (only the low 4 bits are kept).
    pub fn producer_tag(mut self, tag: u8) -> Self {
        self.producer_tag = tag & 0x0f;
        self
    }

    pub fn force_safe(mut self, enabled: bool) -> Self {
        self.force_safe = enabled;
        self
    }

    /// Version word written after the magic.
    pub fn version_word(&self) -> u16 {
        (FORMAT_VERSION & VERSION_MASK) | (u16::from(self.producer_tag & 0x0f) << PRODUCER_TAG_SHIFT)
    }
}
