// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema declarations for reflected objects.
//!
//! A reflected type declares its name and its ordered member list (name +
//! type identity). From that list the archive derives the ObjectHeader once
//! per type and caches it for the rest of the process.
//!
//! # Example
//!
//! ```
//! use starch::{reflect, from_bytes, to_bytes, Success};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Material {
//!     name: String,
//!     roughness: f32,
//!     textures: Vec<String>,
//! }
//!
//! reflect!(Material { name, roughness, textures });
//!
//! let material = Material {
//!     name: "brick".into(),
//!     roughness: 0.8,
//!     textures: vec!["albedo.png".into()],
//! };
//! let bytes = to_bytes(&material).expect("serialize");
//! let mut decoded = Material::default();
//! assert_eq!(from_bytes(&bytes, &mut decoded).expect("deserialize"), Success::Full);
//! assert_eq!(decoded, material);
//! ```

use crate::archive::{ReadableArchive, WritableArchive};
use crate::error::{Result, Success};
use crate::fingerprint::{
    fold_member, object_type_hash, MembersHeader, ObjectHeader, TypeHeader, MEMBER_HASH_SEED,
};
use crate::traits::Fingerprint;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// One declared member: its name and type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub name: &'static str,
    pub type_hash: u32,
}

impl Member {
    pub fn new<T: Fingerprint + ?Sized>(name: &'static str) -> Self {
        Self {
            name,
            type_hash: T::type_hash(),
        }
    }

    /// Declare a member from a field accessor; only the accessor's type is
    /// used.
    pub fn of_field<O, T, F>(name: &'static str, accessor: F) -> Self
    where
        T: Fingerprint + ?Sized,
        F: for<'o> Fn(&'o O) -> &'o T,
    {
        let _ = accessor;
        Self::new::<T>(name)
    }
}

/// A type persisted as a reflected object.
///
/// Usually implemented through [`reflect!`](crate::reflect). Hand-written
/// impls (e.g. members exposed through [`Property`](crate::Property)) must
/// keep `members`, `write_members` and `read_member` in the same order, and
/// add the category impls with [`archive_object!`](crate::archive_object).
pub trait Reflect: Sized + 'static {
    const TYPE_NAME: &'static str;

    /// Ordered member declarations.
    fn members() -> Vec<Member>;

    /// Write every member, in declared order, with
    /// [`WritableArchive::write_member`].
    fn write_members(&self, archive: &mut WritableArchive<'_>) -> Result<()>;

    /// Decode the member at `index` with [`ReadableArchive::read_member`].
    ///
    /// On error the member must be left unchanged.
    fn read_member(&mut self, index: usize, archive: &mut ReadableArchive<'_>) -> Result<Success>;

    /// Runs after every successful (full or partial) decode.
    fn post_deserialize(&mut self) {}
}

/// Derived layout of a reflected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub type_name: &'static str,
    pub type_hash: u32,
    pub member_hash: u32,
    pub members: Vec<Member>,
}

impl Schema {
    pub fn of<T: Reflect>() -> Self {
        let members = T::members();
        let member_hash = members.iter().fold(MEMBER_HASH_SEED, |seed, member| {
            fold_member(seed, member.name, member.type_hash)
        });
        Self {
            type_name: T::TYPE_NAME,
            type_hash: object_type_hash(T::TYPE_NAME),
            member_hash,
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members_header(&self) -> MembersHeader {
        MembersHeader {
            member_hash: self.member_hash,
            count: self.members.len() as u32,
        }
    }

    pub fn object_header(&self, name: &str) -> ObjectHeader {
        ObjectHeader {
            type_header: TypeHeader::new(name, self.type_hash),
            members: self.members_header(),
        }
    }
}

fn schemas() -> &'static DashMap<TypeId, Arc<Schema>> {
    static SCHEMAS: OnceLock<DashMap<TypeId, Arc<Schema>>> = OnceLock::new();
    SCHEMAS.get_or_init(DashMap::new)
}

/// Cached schema of `T`, derived on first use.
pub fn schema_of<T: Reflect>() -> Arc<Schema> {
    let id = TypeId::of::<T>();
    if let Some(schema) = schemas().get(&id) {
        return Arc::clone(schema.value());
    }
    let schema = Arc::new(Schema::of::<T>());
    log::trace!(
        "[schema] registered {} ({} members)",
        schema.type_name,
        schema.len()
    );
    Arc::clone(schemas().entry(id).or_insert(schema).value())
}

/// Implement `Fingerprint`, `Encode` and `Decode` for a type with a
/// hand-written [`Reflect`] impl.
#[macro_export]
macro_rules! archive_object {
    ($ty:ty) => {
        impl $crate::Fingerprint for $ty {
            fn type_hash() -> u32 {
                $crate::fingerprint::object_type_hash(<$ty as $crate::Reflect>::TYPE_NAME)
            }
        }

        impl $crate::Encode for $ty {
            fn encode(
                &self,
                name: &str,
                archive: &mut $crate::WritableArchive<'_>,
            ) -> $crate::Result<()> {
                archive.write_object(name, self)
            }
        }

        impl $crate::Decode for $ty {
            fn decode(
                &mut self,
                name: &str,
                archive: &mut $crate::ReadableArchive<'_>,
            ) -> $crate::Result<$crate::Success> {
                archive.read_object(name, self)
            }
        }
    };
}

/// Declare a struct as a reflected object.
///
/// ```text
/// reflect!(Mesh { vertices, indices });
/// reflect!(Mesh as "render.Mesh" { vertices, indices });
/// reflect!(Mesh { vertices, indices } => rebuild_bounds);
/// ```
///
/// Members are listed in declared order. Every member type must implement
/// `Default` plus the archive traits. The optional `=> method` names an
/// inherent `fn(&mut self)` run after each successful decode.
#[macro_export]
macro_rules! reflect {
    (@impl $ty:ty, $name:expr, [$($field:ident),*], [$($hook:ident)?]) => {
        impl $crate::Reflect for $ty {
            const TYPE_NAME: &'static str = $name;

            fn members() -> ::std::vec::Vec<$crate::Member> {
                ::std::vec![
                    $($crate::Member::of_field(
                        ::core::stringify!($field),
                        |object: &$ty| &object.$field,
                    )),*
                ]
            }

            fn write_members(
                &self,
                archive: &mut $crate::WritableArchive<'_>,
            ) -> $crate::Result<()> {
                $(archive.write_member(::core::stringify!($field), &self.$field)?;)*
                let _ = archive;
                Ok(())
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn read_member(
                &mut self,
                index: usize,
                archive: &mut $crate::ReadableArchive<'_>,
            ) -> $crate::Result<$crate::Success> {
                let mut position = 0usize;
                $(
                    if position == index {
                        let mut value = ::core::default::Default::default();
                        let status = archive.read_member(::core::stringify!($field), &mut value)?;
                        self.$field = value;
                        return Ok(status);
                    }
                    position += 1;
                )*
                Err($crate::ArchiveError::MemberIndex {
                    type_name: <Self as $crate::Reflect>::TYPE_NAME,
                    index,
                })
            }

            fn post_deserialize(&mut self) {
                $(self.$hook();)?
            }
        }

        $crate::archive_object!($ty);
    };
    ($ty:ident { $($field:ident),* $(,)? } $(=> $hook:ident)?) => {
        $crate::reflect!(@impl $ty, ::core::stringify!($ty), [$($field),*], [$($hook)?]);
    };
    ($ty:ty as $name:literal { $($field:ident),* $(,)? } $(=> $hook:ident)?) => {
        $crate::reflect!(@impl $ty, $name, [$($field),*], [$($hook)?]);
    };
}
