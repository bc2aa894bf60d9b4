// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar kinds and the cross-type conversion table used by POD decoding.
//!
//! When a stored member keeps its name but changes its numeric type, the
//! reader recognizes the stored kind from its type hash and converts:
//!
//! | from \ to | integer      | float | bool |
//! |-----------|--------------|-------|------|
//! | integer   | if it fits   | yes   | no   |
//! | float     | no           | yes   | no   |
//! | bool      | no           | no    | yes  |

use crate::fingerprint::pod_type_hash;
use byteorder::{ByteOrder, NativeEndian};

/// Fixed list of convertible scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 11] = [
        ScalarKind::Bool,
        ScalarKind::U8,
        ScalarKind::U16,
        ScalarKind::U32,
        ScalarKind::U64,
        ScalarKind::I8,
        ScalarKind::I16,
        ScalarKind::I32,
        ScalarKind::I64,
        ScalarKind::F32,
        ScalarKind::F64,
    ];

    /// Declared type name (also the input of the type hash).
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }

    /// Size of the stored image in bytes.
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::Bool | ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }

    pub const fn type_hash(self) -> u32 {
        pod_type_hash(self.name())
    }

    /// Recognize a stored scalar from its type hash.
    pub fn from_type_hash(type_hash: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_hash() == type_hash)
    }
}

/// A decoded scalar, widened for conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Int(i128),
    Float(f64),
}

impl ScalarValue {
    /// Decode a stored image of `kind`. Returns `None` if `bytes` has the
    /// wrong length.
    pub fn from_bytes(kind: ScalarKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != kind.size() {
            return None;
        }
        let value = match kind {
            ScalarKind::Bool => ScalarValue::Bool(bytes[0] != 0),
            ScalarKind::U8 => ScalarValue::Int(i128::from(bytes[0])),
            ScalarKind::I8 => ScalarValue::Int(i128::from(bytes[0] as i8)),
            ScalarKind::U16 => ScalarValue::Int(i128::from(NativeEndian::read_u16(bytes))),
            ScalarKind::I16 => ScalarValue::Int(i128::from(NativeEndian::read_i16(bytes))),
            ScalarKind::U32 => ScalarValue::Int(i128::from(NativeEndian::read_u32(bytes))),
            ScalarKind::I32 => ScalarValue::Int(i128::from(NativeEndian::read_i32(bytes))),
            ScalarKind::U64 => ScalarValue::Int(i128::from(NativeEndian::read_u64(bytes))),
            ScalarKind::I64 => ScalarValue::Int(i128::from(NativeEndian::read_i64(bytes))),
            ScalarKind::F32 => ScalarValue::Float(f64::from(NativeEndian::read_f32(bytes))),
            ScalarKind::F64 => ScalarValue::Float(NativeEndian::read_f64(bytes)),
        };
        Some(value)
    }
}

/// Conversion from a widened scalar into a concrete in-memory type.
pub trait FromScalar: Sized {
    fn from_scalar(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_from_scalar_int {
    ($($ty:ty),*) => {$(
        impl FromScalar for $ty {
            fn from_scalar(value: ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::Int(v) => <$ty>::try_from(v).ok(),
                    ScalarValue::Bool(_) | ScalarValue::Float(_) => None,
                }
            }
        }
    )*};
}

macro_rules! impl_from_scalar_float {
    ($($ty:ty),*) => {$(
        impl FromScalar for $ty {
            fn from_scalar(value: ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::Int(v) => Some(v as $ty),
                    ScalarValue::Float(v) => Some(v as $ty),
                    ScalarValue::Bool(_) => None,
                }
            }
        }
    )*};
}

impl_from_scalar_int!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_from_scalar_float!(f32, f64);

impl FromScalar for bool {
    fn from_scalar(value: ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Bool(v) => Some(v),
            ScalarValue::Int(_) | ScalarValue::Float(_) => None,
        }
    }
}
