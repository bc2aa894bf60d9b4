// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive error taxonomy and decode status.

use std::io;
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;

/// Placeholder name of raw reads; replaced by the enclosing member name.
pub(crate) const UNSCOPED: &str = "<raw read>";

/// Errors raised while writing or reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Sink or source failure, including a truncated stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream prologue does not carry the expected magic or format version.
    #[error("Version mismatch: magic {magic:#06x}, version word {version:#06x}")]
    Version { magic: u16, version: u16 },

    /// Structural mismatch or corrupt record (header, bounds, landing offset).
    #[error("Signature mismatch for `{name}`: {reason}")]
    Signature { name: String, reason: String },

    /// Stored scalar cannot be converted into the in-memory member type.
    #[error("Member type mismatch for `{name}`: cannot convert {found} into {expected}")]
    MemberType {
        name: String,
        found: String,
        expected: String,
    },

    /// Polymorphic type id not present in the base's registry.
    #[error("Unknown polymorphic type {type_id:#018x} for base `{base}`")]
    UnknownPoly { base: &'static str, type_id: u64 },

    /// Fixed-length view or container size disagrees with the stored count.
    #[error("Size mismatch for `{name}`: expected {expected} elements, found {found}")]
    Size {
        name: String,
        expected: u64,
        found: u64,
    },

    /// A `Reflect` impl was asked for a member index it does not declare.
    #[error("Member index {index} out of range for `{type_name}`")]
    MemberIndex {
        type_name: &'static str,
        index: usize,
    },
}

impl ArchiveError {
    pub(crate) fn signature(name: &str, reason: impl Into<String>) -> Self {
        Self::Signature {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Attribute a bounds error raised below any named read to `name`.
    pub(crate) fn for_member(self, name: &str) -> Self {
        match self {
            Self::Signature {
                name: scope,
                reason,
            } if scope == UNSCOPED => Self::Signature {
                name: name.to_string(),
                reason,
            },
            other => other,
        }
    }

    pub(crate) fn truncated(what: &str) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ends inside {}", what),
        ))
    }

    /// Returns false only for I/O failures.
    ///
    /// Format errors are recoverable in the sense that a positional search
    /// may try another candidate record; a broken sink or source is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// Outcome of a successful decode.
///
/// `Partial` means at least one member had no matching record and kept its
/// default value. Statuses combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Success {
    #[default]
    Full,
    Partial,
}

impl Success {
    pub fn is_full(self) -> bool {
        self == Self::Full
    }
}

impl BitOr for Success {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        if self == Self::Full && rhs == Self::Full {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

impl BitOrAssign for Success {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
