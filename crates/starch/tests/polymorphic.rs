// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Exact test constants

//! Polymorphic slots: registry lookup, absent values and unknown ids.

use starch::fingerprint::poly_type_id;
use starch::{
    from_bytes, from_bytes_with, poly_base, poly_type, reflect, register_poly_types, to_bytes,
    ArchiveConfig, ArchiveError, Poly, PolyBase, PolyBox, Polymorphic, Success,
};

pub trait Shape: Polymorphic {
    fn area(&self) -> f32;
}

poly_base!(dyn Shape as "Shape");

#[derive(Debug, Default)]
struct Circle {
    radius: f32,
}

reflect!(Circle { radius });
poly_type!(Circle: dyn Shape);

impl Shape for Circle {
    fn area(&self) -> f32 {
        std::f32::consts::PI * self.radius * self.radius
    }
}

#[derive(Debug, Default)]
struct Rect {
    width: f32,
    height: f32,
}

reflect!(Rect { width, height });
poly_type!(Rect: dyn Shape);

impl Shape for Rect {
    fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Debug, Default)]
struct Scene {
    title: String,
    primary: Poly<dyn Shape>,
    extras: Vec<Poly<dyn Shape>>,
}

reflect!(Scene { title, primary, extras });

#[derive(Debug, Default)]
struct Slotted {
    primary: Poly<dyn Shape>,
    title: String,
}

reflect!(Slotted { primary, title });

#[derive(Debug, Default)]
struct Framed {
    shape: PolyBox<dyn Shape>,
    label: String,
}

reflect!(Framed { shape, label });

fn register() {
    register_poly_types!(dyn Shape: Circle, Rect);
}

#[test]
fn test_type_id_is_stable() {
    let circle = Circle::default();
    assert_eq!(circle.poly_type_id(), 0xc83a5d65c99711f3);
    assert_eq!(circle.poly_type_id(), poly_type_id("Circle"));
    assert_eq!(Rect::default().poly_type_name(), "Rect");
}

#[test]
fn test_scene_round_trip() {
    register();
    let scene = Scene {
        title: "demo".into(),
        primary: Poly::new(Box::new(Rect {
            width: 2.0,
            height: 3.0,
        })),
        extras: vec![Poly::new(Box::new(Circle { radius: 1.0 })), Poly::none()],
    };

    let bytes = to_bytes(&scene).expect("Serialize should succeed");
    let mut decoded = Scene::default();
    let status = from_bytes(&bytes, &mut decoded).expect("Deserialize should succeed");
    assert_eq!(status, Success::Full);
    assert_eq!(decoded.title, "demo");

    let primary = decoded.primary.get().expect("Primary should be present");
    assert_eq!(primary.poly_type_name(), "Rect");
    assert_eq!(primary.area(), 6.0);

    assert_eq!(decoded.extras.len(), 2);
    assert_eq!(
        decoded.extras[0].get().map(|shape| shape.poly_type_name()),
        Some("Circle")
    );
    assert!(!decoded.extras[1].is_some());
}

#[test]
fn test_absent_root_slot() {
    let bytes = to_bytes(&Poly::<dyn Shape>::none()).expect("Serialize should succeed");
    let mut decoded = Poly::<dyn Shape>::new(Box::new(Circle { radius: 1.0 }));
    from_bytes(&bytes, &mut decoded).expect("Deserialize should succeed");
    assert!(!decoded.is_some());
}

#[test]
fn test_unknown_type_id() {
    register();
    let slot: Poly<dyn Shape> = Poly::new(Box::new(Circle { radius: 4.0 }));
    let mut bytes = to_bytes(&slot).expect("Serialize should succeed");

    // prologue (4) + slot size (8), then the type id
    bytes[12..20].copy_from_slice(&0x0123_4567_89ab_cdefu64.to_ne_bytes());

    let mut decoded = Poly::<dyn Shape>::none();
    let err = from_bytes(&bytes, &mut decoded).expect_err("Id is not registered");
    match err {
        ArchiveError::UnknownPoly { base, type_id } => {
            assert_eq!(base, "Shape");
            assert_eq!(type_id, 0x0123_4567_89ab_cdef);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!decoded.is_some());
}

#[test]
fn test_registry_contents() {
    register();
    let registry = <dyn Shape as PolyBase>::registry();
    let mut names = registry.names();
    names.sort_unstable();
    assert_eq!(names, vec!["Circle", "Rect"]);

    let created = registry
        .create_from_id(poly_type_id("Rect"))
        .expect("Rect should be registered");
    assert_eq!(created.area(), 0.0);
}

#[test]
fn test_unknown_member_slot_keeps_following_members() {
    register();
    let slotted = Slotted {
        primary: Poly::new(Box::new(Circle { radius: 1.0 })),
        title: "t".into(),
    };
    let mut bytes = to_bytes(&slotted).expect("Serialize should succeed");

    let id = poly_type_id("Circle").to_ne_bytes();
    let at = bytes
        .windows(id.len())
        .position(|window| window == id)
        .expect("Circle id should be in the stream");
    bytes[at..at + 8].copy_from_slice(&1u64.to_ne_bytes());

    let mut strict = Slotted::default();
    let err = from_bytes(&bytes, &mut strict).expect_err("Id is not registered");
    assert!(matches!(err, ArchiveError::UnknownPoly { type_id: 1, .. }));

    let mut decoded = Slotted::default();
    let status = from_bytes_with(&bytes, &mut decoded, ArchiveConfig::default().force_safe(true))
        .expect("Deserialize should succeed");
    assert_eq!(status, Success::Partial);
    assert_eq!(decoded.title, "t");
    assert!(!decoded.primary.is_some());
}

#[test]
fn test_required_slot_round_trip() {
    register();
    let framed = Framed {
        shape: PolyBox::new(Box::new(Circle { radius: 2.0 })),
        label: "disc".into(),
    };
    let bytes = to_bytes(&framed).expect("Serialize should succeed");

    let mut decoded = Framed::default();
    assert!(!decoded.shape.is_set());
    let status = from_bytes(&bytes, &mut decoded).expect("Deserialize should succeed");
    assert_eq!(status, Success::Full);
    assert_eq!(decoded.label, "disc");
    assert_eq!(
        decoded.shape.get().map(|shape| shape.poly_type_name()),
        Some("Circle")
    );

    // Same wire layout as a nullable slot.
    let mut nullable = Poly::<dyn Shape>::none();
    let bytes = to_bytes(&PolyBox::<dyn Shape>::new(Box::new(Rect::default())))
        .expect("Serialize should succeed");
    from_bytes(&bytes, &mut nullable).expect("Deserialize should succeed");
    assert_eq!(nullable.get().map(|shape| shape.poly_type_name()), Some("Rect"));
}

#[test]
fn test_required_slot_rejects_absent_value() {
    let bytes = to_bytes(&Poly::<dyn Shape>::none()).expect("Serialize should succeed");
    let mut required = PolyBox::<dyn Shape>::default();
    let err = from_bytes(&bytes, &mut required).expect_err("Slot is empty");
    assert!(matches!(
        err,
        ArchiveError::UnknownPoly {
            base: "Shape",
            type_id: 0
        }
    ));
    assert!(!required.is_set());

    let err = to_bytes(&PolyBox::<dyn Shape>::default()).expect_err("Unset slot is not written");
    assert!(matches!(err, ArchiveError::UnknownPoly { type_id: 0, .. }));
}
