// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Starch: schema-tolerant binary archives
//!
//! Persist Rust values to a compact, self-describing binary stream and read
//! them back, even after the reading program's types have gained, lost or
//! reordered members.
//!
//! - Reflected objects declare their members with [`reflect!`]
//! - POD values and collections of POD values are copied as raw images
//! - Polymorphic slots ([`Poly`]) record a stable type id and are rebuilt
//!   through a per-base registry
//! - Numeric members convert between scalar kinds when the value fits
//!
//! # Quick Start
//!
//! ```
//! use starch::{reflect, from_bytes, to_bytes, Success};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Settings {
//!     volume: u8,
//!     recent: Vec<String>,
//! }
//!
//! reflect!(Settings { volume, recent });
//!
//! let settings = Settings { volume: 7, recent: vec!["scene.bin".into()] };
//! let bytes = to_bytes(&settings).expect("serialize");
//!
//! let mut loaded = Settings::default();
//! assert_eq!(from_bytes(&bytes, &mut loaded).expect("deserialize"), Success::Full);
//! assert_eq!(loaded, settings);
//! ```
//!
//! # Stream Compatibility
//!
//! | Change on the reading side      | Result                          |
//! |---------------------------------|---------------------------------|
//! | none                            | [`Success::Full`]               |
//! | members reordered               | [`Success::Full`]               |
//! | member added                    | [`Success::Partial`], default kept |
//! | member removed                  | [`Success::Full`], record skipped |
//! | scalar kind widened             | [`Success::Full`], converted    |
//! | type renamed                    | [`ArchiveError::Signature`]     |

pub mod archive;
pub mod config;
pub mod error;
pub mod fingerprint;
mod impls;
pub mod poly;
pub mod property;
pub mod scalar;
pub mod schema;
pub mod traits;

#[doc(hidden)]
pub use bytemuck;

pub use archive::{ElementEncoding, OpenPatch, ReadableArchive, SizePatch, WritableArchive};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result, Success};
pub use poly::{Poly, PolyBase, PolyBox, PolyEntry, PolyRegistry, PolyType, PolyTypeId, Polymorphic};
pub use property::{Property, PropertyMut, PropertyRef};
pub use scalar::{ScalarKind, ScalarValue};
pub use schema::{schema_of, Member, Reflect, Schema};
pub use traits::{Decode, Encode, Fingerprint};

use std::io::Cursor;

/// Serialize `value` into a new byte vector.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>> {
    to_bytes_with(value, ArchiveConfig::default())
}

/// Serialize `value` into a new byte vector with an explicit configuration.
pub fn to_bytes_with<T: Encode + ?Sized>(value: &T, config: ArchiveConfig) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    WritableArchive::with_config(&mut cursor, config).serialize(value)?;
    Ok(cursor.into_inner())
}

/// Deserialize one stream from `bytes` into `value`.
pub fn from_bytes<T: Decode + ?Sized>(bytes: &[u8], value: &mut T) -> Result<Success> {
    from_bytes_with(bytes, value, ArchiveConfig::default())
}

/// Deserialize one stream from `bytes` with an explicit configuration.
pub fn from_bytes_with<T: Decode + ?Sized>(
    bytes: &[u8],
    value: &mut T,
    config: ArchiveConfig,
) -> Result<Success> {
    ReadableArchive::with_config(Cursor::new(bytes), config).deserialize(value)
}
