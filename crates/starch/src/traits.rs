// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value traits the writer and reader dispatch on.
//!
//! A type's category (reflected object, polymorphic slot, tuple, optional,
//! POD, collection) is fixed by its `Encode`/`Decode` impl. The impls for
//! standard types live in `impls`; reflected types get theirs from
//! [`crate::reflect!`] and polymorphic bases from [`crate::poly_base!`].

use crate::archive::{ReadableArchive, WritableArchive};
use crate::error::{Result, Success};
use crate::scalar::{ScalarKind, ScalarValue};

/// Structural type identity.
pub trait Fingerprint {
    /// Type identity hash (bit0 = reflected, bit1 = range).
    fn type_hash() -> u32;

    /// Size of the raw image if the type is bulk-copyable POD.
    fn pod_size() -> Option<usize> {
        None
    }

    /// Scalar kind if the type takes part in numeric conversion.
    fn scalar_kind() -> Option<ScalarKind> {
        None
    }
}

/// Serialization half of a value's category.
pub trait Encode: Fingerprint {
    /// Encode `self` as the record called `name`.
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()>;

    /// Raw native image, for POD types.
    fn pod_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Raw image of a contiguous run of POD values.
    fn pod_slice(items: &[Self]) -> Option<&[u8]>
    where
        Self: Sized,
    {
        let _ = items;
        None
    }
}

/// Deserialization half of a value's category.
pub trait Decode: Fingerprint {
    /// Decode the record called `name` into `self`.
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success>;

    fn pod_bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn pod_slice_mut(items: &mut [Self]) -> Option<&mut [u8]>
    where
        Self: Sized,
    {
        let _ = items;
        None
    }

    /// Assign from a stored scalar of another kind. Returns false when the
    /// conversion is not allowed or loses the value.
    fn convert_scalar(&mut self, value: ScalarValue) -> bool {
        let _ = value;
        false
    }
}
