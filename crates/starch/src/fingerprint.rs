// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural type fingerprints and the record headers built from them.
//!
//! Every value written to an archive is identified by two 32-bit hashes:
//! the hash of its member name and the hash of its type identity. Reflected
//! objects additionally carry a hash of their member layout, so a reader can
//! tell "same type, same layout" from "same type, evolved layout".
//!
//! # Type hash flags
//!
//! ```text
//! bit 0  REFLECTED_FLAG   value is a reflected object
//! bit 1  RANGE_FLAG       value is a length-bound range or view
//! ```
//!
//! Two headers are *compatible* when they are equal ignoring both flags.
//! All hash functions are `const fn`, so fingerprints can be evaluated in
//! constant contexts (see [`poly_type_id`]).

use byteorder::{ByteOrder, NativeEndian};
use std::fmt;

/// Seed of the member/type name string hash.
pub const STRING_HASH_SEED: u32 = 0xec81fb49;

/// Seed of the member layout hash.
pub const MEMBER_HASH_SEED: u32 = 0xafbbc3d1;

/// Seed of the 64-bit polymorphic type id.
pub const POLY_ID_SEED: u64 = 0xe50c9771d834a0bb;

/// Type hash flag: reflected object.
pub const REFLECTED_FLAG: u32 = 0x1;

/// Type hash flag: range or view.
pub const RANGE_FLAG: u32 = 0x2;

/// Both reserved flag bits.
pub const FLAG_MASK: u32 = REFLECTED_FLAG | RANGE_FLAG;

const RANGE_SALT: u32 = 0x5d1c2e3b;
const TUPLE_SALT: u32 = 0x7a4391c5;
const OPTION_SALT: u32 = 0x3bf066a1;
const POLY_SALT: u32 = 0xc2b2ae35;

/// Boost-style hash combine (32-bit).
pub const fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value
        .wrapping_add(0x9e3779b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Boost-style hash combine (64-bit).
pub const fn hash_combine64(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e3779b97f4a7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Hash of a member or type name.
pub const fn str_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut seed = STRING_HASH_SEED;
    let mut i = 0;
    while i < bytes.len() {
        seed = hash_combine(seed, bytes[i] as u32);
        i += 1;
    }
    seed
}

/// Type hash of a plain (POD or scalar) type with the given declared name.
pub const fn pod_type_hash(type_name: &str) -> u32 {
    str_hash(type_name) & !FLAG_MASK
}

/// Type hash of a reflected object with the given declared name.
pub const fn object_type_hash(type_name: &str) -> u32 {
    (str_hash(type_name) & !FLAG_MASK) | REFLECTED_FLAG
}

/// Type hash of a range or view over elements with `element_hash`.
///
/// Growable vectors, deques, slices and arrays share one identity.
pub const fn range_type_hash(element_hash: u32) -> u32 {
    (hash_combine(RANGE_SALT, element_hash) & !FLAG_MASK) | RANGE_FLAG
}

/// Type hash of a tuple, folding the element hashes in order.
pub const fn tuple_type_hash(element_hashes: &[u32]) -> u32 {
    let mut seed = TUPLE_SALT;
    let mut i = 0;
    while i < element_hashes.len() {
        seed = hash_combine(seed, element_hashes[i]);
        i += 1;
    }
    seed & !FLAG_MASK
}

/// Type hash of an optional referent.
pub const fn option_type_hash(inner_hash: u32) -> u32 {
    hash_combine(OPTION_SALT, inner_hash) & !FLAG_MASK
}

/// Type hash of a polymorphic slot over the named base.
pub const fn poly_type_hash(base_name: &str) -> u32 {
    hash_combine(POLY_SALT, str_hash(base_name)) & !FLAG_MASK
}

/// Fold one member into a layout hash.
pub const fn fold_member(seed: u32, name: &str, type_hash: u32) -> u32 {
    hash_combine(hash_combine(seed, str_hash(name)), type_hash)
}

/// 64-bit id of a concrete polymorphic type.
pub const fn poly_type_id(type_name: &str) -> u64 {
    let bytes = type_name.as_bytes();
    let mut seed = POLY_ID_SEED;
    let mut i = 0;
    while i < bytes.len() {
        seed = hash_combine64(seed, bytes[i] as u64);
        i += 1;
    }
    seed
}

/// Name hash + type hash of one record.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHeader {
    pub name_hash: u32,
    pub type_hash: u32,
}

impl TypeHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    pub const fn new(name: &str, type_hash: u32) -> Self {
        Self {
            name_hash: str_hash(name),
            type_hash,
        }
    }

    pub const fn is_reflected(&self) -> bool {
        self.type_hash & REFLECTED_FLAG != 0
    }

    pub const fn is_range(&self) -> bool {
        self.type_hash & RANGE_FLAG != 0
    }

    /// Equal ignoring the reflected/range flags.
    pub const fn is_compatible(&self, other: &Self) -> bool {
        self.name_hash == other.name_hash
            && (self.type_hash & !FLAG_MASK) == (other.type_hash & !FLAG_MASK)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        NativeEndian::write_u32(&mut bytes[0..4], self.name_hash);
        NativeEndian::write_u32(&mut bytes[4..8], self.type_hash);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            name_hash: NativeEndian::read_u32(&bytes[0..4]),
            type_hash: NativeEndian::read_u32(&bytes[4..8]),
        }
    }
}

impl fmt::Debug for TypeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHeader({:08x}:{:08x})", self.name_hash, self.type_hash)
    }
}

impl fmt::Display for TypeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", self.name_hash, self.type_hash)
    }
}

/// Member layout hash + member count of a reflected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MembersHeader {
    pub member_hash: u32,
    pub count: u32,
}

impl MembersHeader {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        NativeEndian::write_u32(&mut bytes[0..4], self.member_hash);
        NativeEndian::write_u32(&mut bytes[4..8], self.count);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            member_hash: NativeEndian::read_u32(&bytes[0..4]),
            count: NativeEndian::read_u32(&bytes[4..8]),
        }
    }
}

/// Full header of a reflected object record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHeader {
    pub type_header: TypeHeader,
    pub members: MembersHeader,
}

impl ObjectHeader {
    pub const SIZE: usize = TypeHeader::SIZE + MembersHeader::SIZE;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..TypeHeader::SIZE].copy_from_slice(&self.type_header.to_bytes());
        bytes[TypeHeader::SIZE..].copy_from_slice(&self.members.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut type_bytes = [0u8; TypeHeader::SIZE];
        let mut member_bytes = [0u8; MembersHeader::SIZE];
        type_bytes.copy_from_slice(&bytes[..TypeHeader::SIZE]);
        member_bytes.copy_from_slice(&bytes[TypeHeader::SIZE..]);
        Self {
            type_header: TypeHeader::from_bytes(&type_bytes),
            members: MembersHeader::from_bytes(&member_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_hash_known_values() {
        assert_eq!(str_hash(""), STRING_HASH_SEED);
        assert_eq!(str_hash("a"), 0x15573065);
        assert_eq!(str_hash("u32"), 0x30d75993);
        assert_eq!(str_hash("Mesh"), 0xd1b7bae1);
    }

    #[test]
    fn test_poly_type_id_known_values() {
        assert_eq!(poly_type_id(""), POLY_ID_SEED);
        assert_eq!(poly_type_id("Circle"), 0xc83a5d65c99711f3);
    }

    #[test]
    fn test_flags() {
        let object = TypeHeader::new("mesh", object_type_hash("Mesh"));
        assert!(object.is_reflected());
        assert!(!object.is_range());

        let range = TypeHeader::new("indices", range_type_hash(pod_type_hash("u32")));
        assert!(range.is_range());
        assert!(!range.is_reflected());

        let plain = TypeHeader::new("x", pod_type_hash("u32"));
        assert!(!plain.is_range() && !plain.is_reflected());
        assert_eq!(tuple_type_hash(&[1, 2, 3]) & FLAG_MASK, 0);
        assert_eq!(option_type_hash(7) & FLAG_MASK, 0);
        assert_eq!(poly_type_hash("Shape") & FLAG_MASK, 0);
    }

    #[test]
    fn test_compatibility_ignores_flags() {
        let a = TypeHeader::new("m", str_hash("Mesh"));
        let b = TypeHeader {
            type_hash: a.type_hash ^ FLAG_MASK,
            ..a
        };
        assert_ne!(a, b);
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&TypeHeader::new("n", a.type_hash)));
    }

    #[test]
    fn test_tuple_hash_is_order_sensitive() {
        let u = pod_type_hash("u32");
        let f = pod_type_hash("f32");
        assert_ne!(tuple_type_hash(&[u, f]), tuple_type_hash(&[f, u]));
    }

    #[test]
    fn test_object_header_bytes() {
        let header = ObjectHeader {
            type_header: TypeHeader::new("root", object_type_hash("Scene")),
            members: MembersHeader {
                member_hash: fold_member(MEMBER_HASH_SEED, "nodes", 42),
                count: 1,
            },
        };
        let bytes = header.to_bytes();
        assert_eq!(ObjectHeader::from_bytes(&bytes), header);
        assert_eq!(&bytes[..4], &header.type_header.name_hash.to_ne_bytes());
    }
}
