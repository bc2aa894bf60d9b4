// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream layer: staging buffer, writer and reader.
//!
//! Every stream starts with a 4-byte prologue (magic, version word) followed
//! by the root value encoded under the name `#root`.
//!
//! ```text
//! +-------+---------+--------------------------------+
//! | magic | version | root value                     |
//! | u16   | u16     | (TypeHeader / ObjectHeader...) |
//! +-------+---------+--------------------------------+
//! ```

#[macro_use]
mod buffer;

pub mod reader;
pub mod writer;

pub use reader::{ElementEncoding, ReadSeek, ReadableArchive};
pub use writer::{OpenPatch, SizePatch, WritableArchive, WriteSeek};
