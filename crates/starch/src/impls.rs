// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive categories of the standard types.
//!
//! | Type                                   | Category                    |
//! |----------------------------------------|-----------------------------|
//! | integers, `f32`, `f64`                 | POD scalar (bulk copyable)  |
//! | `bool`                                 | POD scalar (per element)    |
//! | `#[derive(Pod)]` types + `archive_pod!`| POD aggregate               |
//! | `Vec`, `VecDeque`, `[T]`, `[T; N]`     | collection                  |
//! | `String`, `str`                        | collection of `u8`          |
//! | `HashMap`, `BTreeMap`                  | collection of `(K, V)`      |
//! | tuples (up to 6)                       | tuple                       |
//! | `Option<T>`                            | optional                    |
//! | `Box<T>`, `&T`                         | same as `T`                 |

use crate::archive::{ReadableArchive, WritableArchive};
use crate::error::{ArchiveError, Result, Success};
use crate::fingerprint::{option_type_hash, range_type_hash, tuple_type_hash, TypeHeader};
use crate::scalar::{FromScalar, ScalarKind, ScalarValue};
use crate::traits::{Decode, Encode, Fingerprint};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::mem;

/// Implement the archive traits for a `bytemuck::Pod` type stored as a raw
/// image under a declared type name.
///
/// ```
/// use starch::archive_pod;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
/// #[repr(C)]
/// struct Vec3 {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// archive_pod!(Vec3 => "Vec3");
/// ```
#[macro_export]
macro_rules! archive_pod {
    ($($ty:ty => $name:literal),+ $(,)?) => {$(
        impl $crate::Fingerprint for $ty {
            fn type_hash() -> u32 {
                $crate::fingerprint::pod_type_hash($name)
            }

            fn pod_size() -> ::core::option::Option<usize> {
                ::core::option::Option::Some(::core::mem::size_of::<$ty>())
            }
        }

        impl $crate::Encode for $ty {
            fn encode(
                &self,
                name: &str,
                archive: &mut $crate::WritableArchive<'_>,
            ) -> $crate::Result<()> {
                archive.write_pod(
                    name,
                    <$ty as $crate::Fingerprint>::type_hash(),
                    $crate::bytemuck::bytes_of(self),
                )
            }

            fn pod_bytes(&self) -> ::core::option::Option<&[u8]> {
                ::core::option::Option::Some($crate::bytemuck::bytes_of(self))
            }

            fn pod_slice(items: &[Self]) -> ::core::option::Option<&[u8]> {
                ::core::option::Option::Some($crate::bytemuck::cast_slice(items))
            }
        }

        impl $crate::Decode for $ty {
            fn decode(
                &mut self,
                name: &str,
                archive: &mut $crate::ReadableArchive<'_>,
            ) -> $crate::Result<$crate::Success> {
                archive.read_pod(name, self)
            }

            fn pod_bytes_mut(&mut self) -> ::core::option::Option<&mut [u8]> {
                ::core::option::Option::Some($crate::bytemuck::bytes_of_mut(self))
            }

            fn pod_slice_mut(items: &mut [Self]) -> ::core::option::Option<&mut [u8]> {
                ::core::option::Option::Some($crate::bytemuck::cast_slice_mut(items))
            }
        }
    )+};
}

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Fingerprint for $ty {
            fn type_hash() -> u32 {
                ScalarKind::$kind.type_hash()
            }

            fn pod_size() -> Option<usize> {
                Some(mem::size_of::<$ty>())
            }

            fn scalar_kind() -> Option<ScalarKind> {
                Some(ScalarKind::$kind)
            }
        }

        impl Encode for $ty {
            fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
                archive.write_pod(name, Self::type_hash(), bytemuck::bytes_of(self))
            }

            fn pod_bytes(&self) -> Option<&[u8]> {
                Some(bytemuck::bytes_of(self))
            }

            fn pod_slice(items: &[Self]) -> Option<&[u8]> {
                Some(bytemuck::cast_slice(items))
            }
        }

        impl Decode for $ty {
            fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
                archive.read_pod(name, self)
            }

            fn pod_bytes_mut(&mut self) -> Option<&mut [u8]> {
                Some(bytemuck::bytes_of_mut(self))
            }

            fn pod_slice_mut(items: &mut [Self]) -> Option<&mut [u8]> {
                Some(bytemuck::cast_slice_mut(items))
            }

            fn convert_scalar(&mut self, value: ScalarValue) -> bool {
                match <$ty>::from_scalar(value) {
                    Some(converted) => {
                        *self = converted;
                        true
                    }
                    None => false,
                }
            }
        }
    )*};
}

impl_scalar! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

// bool has invalid bit patterns, so it is POD on the wire but never bulk
// copied.
impl Fingerprint for bool {
    fn type_hash() -> u32 {
        ScalarKind::Bool.type_hash()
    }

    fn scalar_kind() -> Option<ScalarKind> {
        Some(ScalarKind::Bool)
    }
}

impl Encode for bool {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_pod(name, Self::type_hash(), &[u8::from(*self)])
    }
}

impl Decode for bool {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        archive.read_pod(name, self)
    }

    fn convert_scalar(&mut self, value: ScalarValue) -> bool {
        match bool::from_scalar(value) {
            Some(converted) => {
                *self = converted;
                true
            }
            None => false,
        }
    }
}

impl<T: Fingerprint + ?Sized> Fingerprint for &T {
    fn type_hash() -> u32 {
        T::type_hash()
    }

    fn pod_size() -> Option<usize> {
        T::pod_size()
    }

    fn scalar_kind() -> Option<ScalarKind> {
        T::scalar_kind()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        (**self).encode(name, archive)
    }

    fn pod_bytes(&self) -> Option<&[u8]> {
        (**self).pod_bytes()
    }
}

impl<T: Fingerprint + ?Sized> Fingerprint for Box<T> {
    fn type_hash() -> u32 {
        T::type_hash()
    }

    fn pod_size() -> Option<usize> {
        T::pod_size()
    }

    fn scalar_kind() -> Option<ScalarKind> {
        T::scalar_kind()
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        (**self).encode(name, archive)
    }

    fn pod_bytes(&self) -> Option<&[u8]> {
        (**self).pod_bytes()
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        (**self).decode(name, archive)
    }

    fn pod_bytes_mut(&mut self) -> Option<&mut [u8]> {
        (**self).pod_bytes_mut()
    }

    fn convert_scalar(&mut self, value: ScalarValue) -> bool {
        (**self).convert_scalar(value)
    }
}

impl<T: Fingerprint> Fingerprint for Option<T> {
    fn type_hash() -> u32 {
        option_type_hash(T::type_hash())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_optional(name, self.as_ref())
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        if !archive.read_presence(name)? {
            *self = None;
            return Ok(Success::Full);
        }
        match self {
            Some(value) => value.decode(name, archive),
            None => {
                let mut value = T::default();
                let status = value.decode(name, archive)?;
                *self = Some(value);
                Ok(status)
            }
        }
    }
}

macro_rules! impl_tuple {
    ($($elem:ident . $idx:tt),+) => {
        impl<$($elem: Fingerprint),+> Fingerprint for ($($elem,)+) {
            fn type_hash() -> u32 {
                tuple_type_hash(&[$($elem::type_hash()),+])
            }
        }

        impl<$($elem: Encode),+> Encode for ($($elem,)+) {
            fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
                archive.write_type_header(TypeHeader::new(name, Self::type_hash()))?;
                $(self.$idx.encode(name, archive)?;)+
                Ok(())
            }
        }

        impl<$($elem: Decode),+> Decode for ($($elem,)+) {
            fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
                archive.expect_type_header(name, Self::type_hash())?;
                let mut status = Success::Full;
                $(status |= self.$idx.decode(name, archive)?;)+
                Ok(status)
            }
        }
    };
}

impl_tuple!(A.0);
impl_tuple!(A.0, B.1);
impl_tuple!(A.0, B.1, C.2);
impl_tuple!(A.0, B.1, C.2, D.3);
impl_tuple!(A.0, B.1, C.2, D.3, E.4);
impl_tuple!(A.0, B.1, C.2, D.3, E.4, F.5);

/// Decode a stored collection into a cleared vector.
fn decode_vec<E: Decode + Default>(
    items: &mut Vec<E>,
    name: &str,
    archive: &mut ReadableArchive<'_>,
) -> Result<Success> {
    let count = archive.read_u64()?;
    let (len, packed) = archive.read_elements_layout::<E>(name, count)?;
    items.clear();

    let status = match packed {
        Some(encoding) => {
            items.resize_with(len, E::default);
            archive.read_pod_elements(name, encoding, items)?;
            Success::Full
        }
        None => {
            items.reserve(len);
            let mut status = Success::Full;
            for _ in 0..len {
                let mut item = E::default();
                status |= archive.read_record(name, &mut item)?;
                items.push(item);
            }
            status
        }
    };
    archive.check_size(name, count, items.len())?;
    Ok(status)
}

impl<E: Fingerprint> Fingerprint for [E] {
    fn type_hash() -> u32 {
        range_type_hash(E::type_hash())
    }
}

impl<E: Encode> Encode for [E] {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_slice(name, self)
    }
}

/// Fixed-length view: the stored count must equal the slice length.
impl<E: Decode> Decode for [E] {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let count = archive.read_u64()?;
        if count != self.len() as u64 {
            return Err(ArchiveError::Size {
                name: name.to_string(),
                expected: self.len() as u64,
                found: count,
            });
        }

        let (_, packed) = archive.read_elements_layout::<E>(name, count)?;
        match packed {
            Some(encoding) => {
                archive.read_pod_elements(name, encoding, self)?;
                Ok(Success::Full)
            }
            None => {
                let mut status = Success::Full;
                for item in self.iter_mut() {
                    status |= archive.read_record(name, item)?;
                }
                Ok(status)
            }
        }
    }
}

impl<E: Fingerprint, const N: usize> Fingerprint for [E; N] {
    fn type_hash() -> u32 {
        <[E]>::type_hash()
    }
}

impl<E: Encode, const N: usize> Encode for [E; N] {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_slice(name, self.as_slice())
    }
}

impl<E: Decode, const N: usize> Decode for [E; N] {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        self.as_mut_slice().decode(name, archive)
    }
}

impl<E: Fingerprint> Fingerprint for Vec<E> {
    fn type_hash() -> u32 {
        <[E]>::type_hash()
    }
}

impl<E: Encode> Encode for Vec<E> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_slice(name, self)
    }
}

impl<E: Decode + Default> Decode for Vec<E> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        decode_vec(self, name, archive)
    }
}

impl<E: Fingerprint> Fingerprint for VecDeque<E> {
    fn type_hash() -> u32 {
        <[E]>::type_hash()
    }
}

/// Non-contiguous storage: POD elements are copied one at a time, producing
/// the same bytes as the bulk path of `Vec`.
impl<E: Encode> Encode for VecDeque<E> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_sequence(name, self.iter())
    }
}

impl<E: Decode + Default> Decode for VecDeque<E> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let mut items = Vec::new();
        let status = decode_vec(&mut items, name, archive)?;
        *self = VecDeque::from(items);
        Ok(status)
    }
}

impl Fingerprint for str {
    fn type_hash() -> u32 {
        <[u8]>::type_hash()
    }
}

impl Encode for str {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_slice(name, self.as_bytes())
    }
}

impl Fingerprint for String {
    fn type_hash() -> u32 {
        <[u8]>::type_hash()
    }
}

impl Encode for String {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_slice(name, self.as_bytes())
    }
}

impl Decode for String {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let mut bytes = Vec::new();
        let status = decode_vec(&mut bytes, name, archive)?;
        *self = String::from_utf8(bytes).map_err(|err| ArchiveError::signature(name, err.to_string()))?;
        Ok(status)
    }
}

macro_rules! impl_map {
    ($map:ident, [$($bound:tt)*], [$($extra:ident),*]) => {
        impl<K: Fingerprint, V: Fingerprint $(, $extra)*> Fingerprint for $map<K, V $(, $extra)*> {
            fn type_hash() -> u32 {
                <[(K, V)]>::type_hash()
            }
        }

        impl<K: Encode, V: Encode $(, $extra)*> Encode for $map<K, V $(, $extra)*> {
            fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
                archive.write_sequence(name, self.iter())
            }
        }

        /// Entries are inserted in stored order; duplicate keys make the
        /// map smaller than the stored count and fail with `Size`.
        impl<K, V $(, $extra)*> Decode for $map<K, V $(, $extra)*>
        where
            K: Decode + Default + $($bound)*,
            V: Decode + Default,
            $($extra: BuildHasher + Default,)*
        {
            fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
                let count = archive.read_u64()?;
                let (len, _) = archive.read_elements_layout::<(K, V)>(name, count)?;
                self.clear();

                let mut status = Success::Full;
                for _ in 0..len {
                    let mut entry = <(K, V)>::default();
                    status |= archive.read_record(name, &mut entry)?;
                    self.insert(entry.0, entry.1);
                }
                archive.check_size(name, count, self.len())?;
                Ok(status)
            }
        }
    };
}

impl_map!(HashMap, [Eq + Hash], [S]);
impl_map!(BTreeMap, [Ord], []);
