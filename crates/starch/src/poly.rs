// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Polymorphic sub-objects and their per-base type registries.
//!
//! A polymorphic slot ([`Poly<dyn Base>`](Poly)) stores the 64-bit id of the
//! concrete type followed by the concrete object. Reading it back looks the
//! id up in the base's [`PolyRegistry`] and builds a fresh instance through
//! the registered factory.
//!
//! Registries are append-only singly linked lists. Readers walk the list
//! without locking; registration prepends a node with an RCU update, so a
//! concurrent reader sees either the old or the new head.
//!
//! # Example
//!
//! ```
//! use starch::{poly_base, poly_type, reflect, register_poly_types, from_bytes, to_bytes,
//!     Poly, Polymorphic, PolyBase};
//!
//! pub trait Shape: Polymorphic {
//!     fn area(&self) -> f32;
//! }
//! poly_base!(dyn Shape as "Shape");
//!
//! #[derive(Debug, Default)]
//! struct Circle {
//!     radius: f32,
//! }
//! reflect!(Circle { radius });
//! poly_type!(Circle: dyn Shape);
//!
//! impl Shape for Circle {
//!     fn area(&self) -> f32 {
//!         std::f32::consts::PI * self.radius * self.radius
//!     }
//! }
//!
//! register_poly_types!(dyn Shape: Circle);
//!
//! let slot: Poly<dyn Shape> = Poly::new(Box::new(Circle { radius: 2.0 }));
//! let bytes = to_bytes(&slot).expect("serialize");
//! let mut decoded = Poly::<dyn Shape>::none();
//! from_bytes(&bytes, &mut decoded).expect("deserialize");
//! assert_eq!(decoded.get().map(|shape| shape.poly_type_name()), Some("Circle"));
//! ```

use crate::archive::{ReadableArchive, WritableArchive};
use crate::error::{ArchiveError, Result, Success};
use crate::fingerprint::{poly_type_hash, poly_type_id};
use crate::schema::Reflect;
use crate::traits::{Decode, Encode, Fingerprint};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;

/// Stable 64-bit id of a concrete polymorphic type.
pub type PolyTypeId = u64;

/// Uniform interface of every polymorphic object.
pub trait Polymorphic {
    fn poly_type_id(&self) -> PolyTypeId;

    fn poly_type_name(&self) -> &'static str;

    /// Encode the concrete object as a reflected object called `name`.
    fn poly_serialize(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()>;

    /// Decode the concrete object from a reflected object called `name`.
    fn poly_deserialize(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success>;
}

/// An abstract base (`dyn Trait`) owning a registry of concrete types.
///
/// Implemented by [`poly_base!`](crate::poly_base).
pub trait PolyBase: Polymorphic + 'static {
    const BASE_NAME: &'static str;

    fn registry() -> &'static PolyRegistry<Self>;
}

/// A concrete type constructible through the registry of base `B`.
///
/// Implemented by [`poly_type!`](crate::poly_type).
pub trait PolyType<B: PolyBase + ?Sized>: Reflect {
    fn create() -> Box<B>;
}

/// One registered concrete type.
pub struct PolyEntry<B: ?Sized> {
    type_id: PolyTypeId,
    name: &'static str,
    create: fn() -> Box<B>,
    next: Option<Arc<PolyEntry<B>>>,
}

impl<B: ?Sized> PolyEntry<B> {
    pub fn type_id(&self) -> PolyTypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a default instance of the concrete type.
    pub fn create(&self) -> Box<B> {
        (self.create)()
    }
}

impl<B: ?Sized> fmt::Debug for PolyEntry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolyEntry")
            .field("type_id", &format_args!("{:#018x}", self.type_id))
            .field("name", &self.name)
            .finish()
    }
}

/// Append-only registry of the concrete types of one base.
pub struct PolyRegistry<B: ?Sized> {
    head: ArcSwapOption<PolyEntry<B>>,
}

impl<B: ?Sized> PolyRegistry<B> {
    pub fn new() -> Self {
        Self {
            head: ArcSwapOption::new(None),
        }
    }

    /// Iterate entries, most recently registered first.
    pub fn entries(&self) -> Entries<B> {
        Entries {
            next: self.head.load_full(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries().map(|entry| entry.name).collect()
    }

    pub fn find_by_id(&self, type_id: PolyTypeId) -> Option<Arc<PolyEntry<B>>> {
        self.entries().find(|entry| entry.type_id == type_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<PolyEntry<B>>> {
        self.entries().find(|entry| entry.name == name)
    }

    pub fn create_from_id(&self, type_id: PolyTypeId) -> Option<Box<B>> {
        self.find_by_id(type_id).map(|entry| entry.create())
    }

    pub fn create_from_name(&self, name: &str) -> Option<Box<B>> {
        self.find_by_name(name).map(|entry| entry.create())
    }

    fn chain_contains(head: &Option<Arc<PolyEntry<B>>>, type_id: PolyTypeId) -> bool {
        let mut cursor = head.as_ref();
        while let Some(entry) = cursor {
            if entry.type_id == type_id {
                return true;
            }
            cursor = entry.next.as_ref();
        }
        false
    }
}

impl<B: PolyBase + ?Sized> PolyRegistry<B> {
    /// Register `T`. Returns false if its id was already present.
    pub fn register<T: PolyType<B>>(&self) -> bool {
        let type_id = poly_type_id(T::TYPE_NAME);
        let previous = self.head.rcu(|head| {
            if Self::chain_contains(head, type_id) {
                head.clone()
            } else {
                Some(Arc::new(PolyEntry {
                    type_id,
                    name: T::TYPE_NAME,
                    create: <T as PolyType<B>>::create,
                    next: head.clone(),
                }))
            }
        });

        if Self::chain_contains(&previous, type_id) {
            if let Some(existing) = self.find_by_id(type_id) {
                if existing.name != T::TYPE_NAME {
                    log::warn!(
                        "[PolyRegistry] {}: id {:#018x} of {} already taken by {}",
                        B::BASE_NAME,
                        type_id,
                        T::TYPE_NAME,
                        existing.name
                    );
                }
            }
            return false;
        }

        log::debug!(
            "[PolyRegistry] {}: registered {} ({:#018x})",
            B::BASE_NAME,
            T::TYPE_NAME,
            type_id
        );
        true
    }
}

impl<B: ?Sized> Default for PolyRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ?Sized> fmt::Debug for PolyRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

/// Iterator over registry entries.
pub struct Entries<B: ?Sized> {
    next: Option<Arc<PolyEntry<B>>>,
}

impl<B: ?Sized> Iterator for Entries<B> {
    type Item = Arc<PolyEntry<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next.take()?;
        self.next = entry.next.clone();
        Some(entry)
    }
}

/// Nullable polymorphic slot.
pub struct Poly<B: ?Sized>(pub Option<Box<B>>);

impl<B: ?Sized> Poly<B> {
    pub fn new(value: Box<B>) -> Self {
        Self(Some(value))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&B> {
        self.0.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut B> {
        self.0.as_deref_mut()
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    pub fn take(&mut self) -> Option<Box<B>> {
        self.0.take()
    }

    pub fn into_inner(self) -> Option<Box<B>> {
        self.0
    }
}

impl<B: ?Sized> Default for Poly<B> {
    fn default() -> Self {
        Self(None)
    }
}

impl<B: ?Sized> From<Box<B>> for Poly<B> {
    fn from(value: Box<B>) -> Self {
        Self::new(value)
    }
}

impl<B: PolyBase + ?Sized> fmt::Debug for Poly<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(object) => write!(f, "Poly<{}>({})", B::BASE_NAME, object.poly_type_name()),
            None => write!(f, "Poly<{}>(none)", B::BASE_NAME),
        }
    }
}

impl<B: PolyBase + ?Sized> Fingerprint for Poly<B> {
    fn type_hash() -> u32 {
        poly_type_hash(B::BASE_NAME)
    }
}

impl<B: PolyBase + ?Sized> Encode for Poly<B> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        archive.write_poly(name, self.get())
    }
}

impl<B: PolyBase + ?Sized> Decode for Poly<B> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let (value, status) = archive.read_poly::<B>(name, true)?;
        self.0 = value;
        Ok(status)
    }
}

/// Polymorphic slot that must hold a value.
///
/// Same wire layout as [`Poly`], but a stored absent value fails with
/// `UnknownPoly` (type id 0) instead of decoding to nothing, and so does
/// writing an unset slot. A default `PolyBox` is unset until decoded.
pub struct PolyBox<B: ?Sized>(Option<Box<B>>);

impl<B: ?Sized> PolyBox<B> {
    pub fn new(value: Box<B>) -> Self {
        Self(Some(value))
    }

    pub fn get(&self) -> Option<&B> {
        self.0.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut B> {
        self.0.as_deref_mut()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn into_inner(self) -> Option<Box<B>> {
        self.0
    }
}

impl<B: ?Sized> Default for PolyBox<B> {
    fn default() -> Self {
        Self(None)
    }
}

impl<B: ?Sized> From<Box<B>> for PolyBox<B> {
    fn from(value: Box<B>) -> Self {
        Self::new(value)
    }
}

impl<B: PolyBase + ?Sized> fmt::Debug for PolyBox<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(object) => write!(f, "PolyBox<{}>({})", B::BASE_NAME, object.poly_type_name()),
            None => write!(f, "PolyBox<{}>(unset)", B::BASE_NAME),
        }
    }
}

impl<B: PolyBase + ?Sized> Fingerprint for PolyBox<B> {
    fn type_hash() -> u32 {
        poly_type_hash(B::BASE_NAME)
    }
}

impl<B: PolyBase + ?Sized> Encode for PolyBox<B> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        match self.get() {
            Some(object) => archive.write_poly(name, Some(object)),
            None => Err(ArchiveError::UnknownPoly {
                base: B::BASE_NAME,
                type_id: 0,
            }),
        }
    }
}

impl<B: PolyBase + ?Sized> Decode for PolyBox<B> {
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let (value, status) = archive.read_poly::<B>(name, false)?;
        self.0 = value;
        Ok(status)
    }
}

/// Declare `dyn Trait` as a polymorphic base with its own registry.
///
/// ```text
/// poly_base!(dyn Shape as "Shape");
/// ```
#[macro_export]
macro_rules! poly_base {
    ($base:ty as $name:literal) => {
        impl $crate::PolyBase for $base {
            const BASE_NAME: &'static str = $name;

            fn registry() -> &'static $crate::PolyRegistry<Self> {
                static REGISTRY: ::std::sync::OnceLock<$crate::PolyRegistry<$base>> =
                    ::std::sync::OnceLock::new();
                REGISTRY.get_or_init($crate::PolyRegistry::new)
            }
        }
    };
}

/// Declare a reflected type as a concrete implementation of a base.
///
/// The type registers itself the first time it is serialized through a
/// polymorphic slot; readers should register every type up front with
/// [`register_poly_types!`](crate::register_poly_types).
///
/// ```text
/// poly_type!(Circle: dyn Shape);
/// ```
#[macro_export]
macro_rules! poly_type {
    ($ty:ty : $base:ty) => {
        impl $crate::Polymorphic for $ty {
            fn poly_type_id(&self) -> $crate::PolyTypeId {
                $crate::fingerprint::poly_type_id(<$ty as $crate::Reflect>::TYPE_NAME)
            }

            fn poly_type_name(&self) -> &'static str {
                <$ty as $crate::Reflect>::TYPE_NAME
            }

            fn poly_serialize(
                &self,
                name: &str,
                archive: &mut $crate::WritableArchive<'_>,
            ) -> $crate::Result<()> {
                static REGISTERED: ::std::sync::Once = ::std::sync::Once::new();
                REGISTERED.call_once(|| {
                    let _ = <$base as $crate::PolyBase>::registry().register::<$ty>();
                });
                archive.write_object(name, self)
            }

            fn poly_deserialize(
                &mut self,
                name: &str,
                archive: &mut $crate::ReadableArchive<'_>,
            ) -> $crate::Result<$crate::Success> {
                archive.read_object(name, self)
            }
        }

        impl $crate::PolyType<$base> for $ty {
            fn create() -> ::std::boxed::Box<$base> {
                ::std::boxed::Box::new(<$ty as ::core::default::Default>::default())
            }
        }
    };
}

/// Registration pass: register concrete types with a base's registry.
///
/// Evaluates to the number of types newly inserted.
///
/// ```text
/// register_poly_types!(dyn Shape: Circle, Square);
/// ```
#[macro_export]
macro_rules! register_poly_types {
    ($base:ty : $($ty:ty),+ $(,)?) => {{
        let registry = <$base as $crate::PolyBase>::registry();
        0usize $(+ usize::from(registry.register::<$ty>()))+
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Node: Polymorphic {
        fn weight(&self) -> u32;
    }

    crate::poly_base!(dyn Node as "Node");

    #[derive(Debug, Default)]
    struct Leaf {
        weight: u32,
    }

    crate::reflect!(Leaf { weight });
    crate::poly_type!(Leaf: dyn Node);

    impl Node for Leaf {
        fn weight(&self) -> u32 {
            self.weight
        }
    }

    #[derive(Debug, Default)]
    struct Branch {
        children: Vec<Poly<dyn Node>>,
    }

    crate::reflect!(Branch { children });
    crate::poly_type!(Branch: dyn Node);

    impl Node for Branch {
        fn weight(&self) -> u32 {
            self.children
                .iter()
                .filter_map(|child| child.get())
                .map(|child| child.weight())
                .sum()
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = PolyRegistry::<dyn Node>::new();
        assert!(registry.is_empty());
        assert!(registry.register::<Leaf>());
        assert!(!registry.register::<Leaf>());
        assert!(registry.register::<Branch>());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Branch", "Leaf"]);
    }

    #[test]
    fn test_lookup_and_create() {
        let registry = PolyRegistry::<dyn Node>::new();
        registry.register::<Leaf>();

        let id = poly_type_id("Leaf");
        let entry = registry.find_by_id(id).expect("Leaf should be registered");
        assert_eq!(entry.name(), "Leaf");
        assert_eq!(entry.type_id(), id);

        let created = registry.create_from_name("Leaf").expect("Create should succeed");
        assert_eq!(created.poly_type_name(), "Leaf");
        assert_eq!(created.weight(), 0);
        assert!(registry.create_from_id(poly_type_id("Branch")).is_none());
        assert!(registry.find_by_name("Branch").is_none());
    }

    #[test]
    fn test_global_registration_pass() {
        crate::register_poly_types!(dyn Node: Leaf, Branch);
        let registry = <dyn Node as PolyBase>::registry();
        assert!(registry.find_by_name("Leaf").is_some());
        assert!(registry.find_by_name("Branch").is_some());
        assert_eq!(crate::register_poly_types!(dyn Node: Leaf), 0);
    }

    #[test]
    fn test_nested_slots_round_trip() {
        crate::register_poly_types!(dyn Node: Leaf, Branch);
        let tree: Poly<dyn Node> = Poly::new(Box::new(Branch {
            children: vec![
                Poly::new(Box::new(Leaf { weight: 3 })),
                Poly::none(),
                Poly::new(Box::new(Branch {
                    children: vec![Poly::new(Box::new(Leaf { weight: 4 }))],
                })),
            ],
        }));

        let bytes = crate::to_bytes(&tree).expect("Serialize should succeed");
        let mut decoded = Poly::<dyn Node>::none();
        let status = crate::from_bytes(&bytes, &mut decoded).expect("Deserialize should succeed");
        assert_eq!(status, Success::Full);
        let root = decoded.get().expect("Root should be present");
        assert_eq!(root.poly_type_name(), "Branch");
        assert_eq!(root.weight(), 7);
        assert_eq!(format!("{:?}", decoded), "Poly<Node>(Branch)");
    }
}
