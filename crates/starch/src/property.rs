// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Getter/setter members.
//!
//! A [`Property`] lets a reflected type expose a member that is computed or
//! validated on access. It has no header of its own: it encodes exactly as
//! the getter's return value would, so a member can move between a plain
//! field and a property without changing the stream.
//!
//! # Example
//!
//! ```
//! use starch::{archive_object, Member, Property, ReadableArchive, Reflect, Result, Success,
//!     WritableArchive};
//!
//! #[derive(Debug, Default)]
//! struct Light {
//!     intensity: f32,
//! }
//!
//! impl Light {
//!     fn intensity(&self) -> f32 {
//!         self.intensity
//!     }
//!     fn set_intensity(&mut self, value: f32) {
//!         self.intensity = value.max(0.0);
//!     }
//! }
//!
//! const INTENSITY: Property<Light, f32> = Property::new(Light::intensity, Light::set_intensity);
//!
//! impl Reflect for Light {
//!     const TYPE_NAME: &'static str = "Light";
//!
//!     fn members() -> Vec<Member> {
//!         vec![INTENSITY.member("intensity")]
//!     }
//!
//!     fn write_members(&self, archive: &mut WritableArchive<'_>) -> Result<()> {
//!         archive.write_member("intensity", &INTENSITY.bind(self))
//!     }
//!
//!     fn read_member(&mut self, index: usize, archive: &mut ReadableArchive<'_>) -> Result<Success> {
//!         match index {
//!             0 => archive.read_member("intensity", &mut INTENSITY.bind_mut(self)),
//!             _ => Err(starch::ArchiveError::MemberIndex { type_name: "Light", index }),
//!         }
//!     }
//! }
//!
//! archive_object!(Light);
//! ```

use crate::archive::{ReadableArchive, WritableArchive};
use crate::error::{Result, Success};
use crate::schema::Member;
use crate::scalar::{ScalarKind, ScalarValue};
use crate::traits::{Decode, Encode, Fingerprint};
use std::fmt;

/// Getter/setter pair over an object of type `O`.
pub struct Property<O, T> {
    get: fn(&O) -> T,
    set: fn(&mut O, T),
}

impl<O, T> Property<O, T> {
    pub const fn new(get: fn(&O) -> T, set: fn(&mut O, T)) -> Self {
        Self { get, set }
    }

    /// Read-side view over `object`.
    pub fn bind<'a>(&self, object: &'a O) -> PropertyRef<'a, O, T> {
        PropertyRef {
            object,
            get: self.get,
        }
    }

    /// Write-side view over `object`.
    pub fn bind_mut<'a>(&self, object: &'a mut O) -> PropertyMut<'a, O, T> {
        PropertyMut {
            object,
            set: self.set,
        }
    }

    pub fn get(&self, object: &O) -> T {
        (self.get)(object)
    }

    pub fn set(&self, object: &mut O, value: T) {
        (self.set)(object, value);
    }
}

impl<O, T: Fingerprint> Property<O, T> {
    /// Member declaration for this property.
    pub fn member(&self, name: &'static str) -> Member {
        Member::new::<T>(name)
    }
}

impl<O, T> Clone for Property<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for Property<O, T> {}

impl<O, T> fmt::Debug for Property<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").finish_non_exhaustive()
    }
}

/// Encodable view of a property.
pub struct PropertyRef<'a, O, T> {
    object: &'a O,
    get: fn(&O) -> T,
}

/// Decodable view of a property.
///
/// Meant to be read as a whole member record: the setter runs only once the
/// value has been decoded and has landed on the record end.
pub struct PropertyMut<'a, O, T> {
    object: &'a mut O,
    set: fn(&mut O, T),
}

impl<O, T: Fingerprint> Fingerprint for PropertyRef<'_, O, T> {
    fn type_hash() -> u32 {
        T::type_hash()
    }

    fn scalar_kind() -> Option<ScalarKind> {
        T::scalar_kind()
    }
}

impl<O, T: Encode> Encode for PropertyRef<'_, O, T> {
    fn encode(&self, name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
        (self.get)(self.object).encode(name, archive)
    }
}

impl<O, T: Fingerprint> Fingerprint for PropertyMut<'_, O, T> {
    fn type_hash() -> u32 {
        T::type_hash()
    }

    fn scalar_kind() -> Option<ScalarKind> {
        T::scalar_kind()
    }
}

impl<O, T: Decode + Default> Decode for PropertyMut<'_, O, T> {
    /// Decodes into a fresh `T` and hands it to the setter only on success.
    fn decode(&mut self, name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
        let mut value = T::default();
        let status = archive.read_member(name, &mut value)?;
        (self.set)(self.object, value);
        Ok(status)
    }

    fn convert_scalar(&mut self, scalar: ScalarValue) -> bool {
        let mut value = T::default();
        if !value.convert_scalar(scalar) {
            return false;
        }
        (self.set)(self.object, value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::pod_type_hash;

    #[derive(Default)]
    struct Gauge {
        level: u8,
    }

    fn level(gauge: &Gauge) -> u32 {
        u32::from(gauge.level)
    }

    fn set_level(gauge: &mut Gauge, value: u32) {
        gauge.level = value.min(100) as u8;
    }

    const LEVEL: Property<Gauge, u32> = Property::new(level, set_level);

    #[test]
    fn test_property_has_value_identity() {
        assert_eq!(PropertyRef::<Gauge, u32>::type_hash(), pod_type_hash("u32"));
        assert_eq!(LEVEL.member("level").type_hash, u32::type_hash());
    }

    /// A record holding a u32 value followed by one stray byte.
    struct PaddedLevel;

    impl Fingerprint for PaddedLevel {
        fn type_hash() -> u32 {
            u32::type_hash()
        }
    }

    impl Encode for PaddedLevel {
        fn encode(&self, _name: &str, archive: &mut WritableArchive<'_>) -> Result<()> {
            let open = archive.begin_size_patch()?;
            7u32.encode("level", archive)?;
            archive.write_u8(0xff)?;
            archive.end_size_patch(open);
            Ok(())
        }
    }

    struct LevelRecord<'a>(&'a mut Gauge);

    impl Fingerprint for LevelRecord<'_> {
        fn type_hash() -> u32 {
            u32::type_hash()
        }
    }

    impl Decode for LevelRecord<'_> {
        fn decode(&mut self, _name: &str, archive: &mut ReadableArchive<'_>) -> Result<Success> {
            archive.read_record("level", &mut LEVEL.bind_mut(self.0))
        }
    }

    #[test]
    fn test_setter_skipped_when_record_has_trailing_bytes() {
        let bytes = crate::to_bytes(&PaddedLevel).expect("Serialize should succeed");
        let mut gauge = Gauge { level: 1 };
        let err = crate::from_bytes(&bytes, &mut LevelRecord(&mut gauge))
            .expect_err("Value stops before the record end");
        assert!(matches!(err, crate::ArchiveError::Signature { .. }));
        assert_eq!(gauge.level, 1);
    }

    #[test]
    fn test_property_accessors() {
        let mut gauge = Gauge::default();
        LEVEL.set(&mut gauge, 250);
        assert_eq!(LEVEL.get(&gauge), 100);
    }

    #[test]
    fn test_property_round_trip_through_setter() {
        let gauge = Gauge { level: 42 };
        let bytes = crate::to_bytes(&LEVEL.bind(&gauge)).expect("Serialize should succeed");
        assert_eq!(bytes, crate::to_bytes(&42u32).expect("Serialize should succeed"));

        let mut decoded = Gauge::default();
        let status = crate::from_bytes(&bytes, &mut LEVEL.bind_mut(&mut decoded))
            .expect("Deserialize should succeed");
        assert_eq!(status, Success::Full);
        assert_eq!(decoded.level, 42);
    }
}
