use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use armature_api_core::{
    ControlValue, ElementKey, ElementTypeMask, ElementWeight, Rotator, Transform, UnitQuaternion,
    Vector3,
};
use armature_hierarchy_core::{
    read_hierarchy, shared, write_hierarchy, ControlValueType, HierarchyDefinition, HierarchyError,
    RigHierarchy,
};

fn biped() -> RigHierarchy {
    let def: HierarchyDefinition = armature_test_fixtures::hierarchies::load("biped").unwrap();
    def.build().unwrap()
}

fn rotated(x: f32, y: f32, z: f32, yaw_degrees: f32) -> Transform {
    Transform::new(
        Vector3::new(x, y, z),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw_degrees.to_radians()),
        Vector3::new(1.0, 1.0, 1.0),
    )
}

#[test]
fn child_follows_root_translation() {
    let mut h = HierarchyDefinition::from_json_str(
        r#"{"elements":[
            {"type":"Bone","name":"Root"},
            {"type":"Bone","name":"Child","parent":"Bone:Root","transform":{"translation":[3,1,0]}}
        ]}"#,
    )
    .unwrap()
    .build()
    .unwrap();
    let root = ElementKey::bone("Root");
    let child = ElementKey::bone("Child");
    h.set_local_transform(&root, Transform::from_translation(Vector3::new(0.0, 0.0, 10.0)), false, true)
        .unwrap();
    let local = h.local_transform(&child, false).unwrap();
    let global = h.global_transform(&child, false).unwrap();
    assert_relative_eq!(
        global.translation,
        local.translation + Vector3::new(0.0, 0.0, 10.0),
        epsilon = 1e-5
    );
}

#[test]
fn global_is_local_composed_with_blended_parents() {
    let mut h = HierarchyDefinition::from_json_str(
        r#"{"elements":[
            {"type":"Null","name":"A","transform":{"translation":[2,0,0]}},
            {"type":"Null","name":"B","transform":{"translation":[0,4,0]}},
            {"type":"Null","name":"Item","transform":{"translation":[1,0,0]},
             "parents":[{"key":"Null:A","weight":1.0},{"key":"Null:B","weight":1.0}]}
        ]}"#,
    )
    .unwrap()
    .build()
    .unwrap();
    let item = ElementKey::null("Item");
    let g = h.global_transform(&item, false).unwrap();
    assert_relative_eq!(g.translation, Vector3::new(2.0, 2.0, 0.0), epsilon = 1e-5);

    // Evaluation order does not matter: touch B first, then read.
    h.set_global_transform(&ElementKey::null("B"), Transform::from_translation(Vector3::new(0.0, 8.0, 0.0)), false, true)
        .unwrap();
    let g = h.global_transform(&item, false).unwrap();
    let frame = h.parent_transform(&item, false).unwrap();
    let local = h.local_transform(&item, false).unwrap();
    assert!(g.approx_eq(&local.compose(&frame), 1e-4));
    assert_relative_eq!(g.translation, Vector3::new(2.0, 4.0, 0.0), epsilon = 1e-5);
}

#[test]
fn set_then_get_round_trips_in_both_spaces() {
    let mut h = biped();
    let hand = ElementKey::bone("hand_l");
    let target = rotated(40.0, -10.0, 150.0, 35.0);
    h.set_global_transform(&hand, target, false, true).unwrap();
    assert!(h.global_transform(&hand, false).unwrap().approx_eq(&target, 1e-3));

    let local = rotated(5.0, 5.0, 0.0, -80.0);
    h.set_local_transform(&hand, local, false, true).unwrap();
    assert!(h.local_transform(&hand, false).unwrap().approx_eq(&local, 1e-4));
}

#[test]
fn reset_pose_to_initial_twice_matches_once() {
    let mut h = biped();
    h.set_local_transform(&ElementKey::bone("spine_01"), rotated(0.0, 0.0, 25.0, 20.0), false, true)
        .unwrap();
    h.set_curve_value(&ElementKey::curve("smile"), 0.7).unwrap();
    h.reset_pose_to_initial(ElementTypeMask::ALL);
    let once = h.get_pose(false, ElementTypeMask::ALL, &[]);
    h.reset_pose_to_initial(ElementTypeMask::ALL);
    let twice = h.get_pose(false, ElementTypeMask::ALL, &[]);
    assert_eq!(once, twice);
    let initial = h.get_pose(true, ElementTypeMask::ALL, &[]);
    for (a, b) in once.iter().zip(initial.iter()) {
        assert!(a.local.approx_eq(&b.local, 1e-6), "{} differs", a.key());
    }
}

#[test]
fn switching_to_a_descendant_is_rejected_silently() {
    let mut h = HierarchyDefinition::from_json_str(
        r#"{"elements":[
            {"type":"Bone","name":"Root"},
            {"type":"Bone","name":"Child","parent":"Bone:Root"},
            {"type":"Null","name":"Root2","parent":"Bone:Child"}
        ]}"#,
    )
    .unwrap()
    .build()
    .unwrap();
    let events = Arc::new(AtomicUsize::new(0));
    let counter = events.clone();
    h.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let child = ElementKey::bone("Child");
    let before = h.parent_weights(&child, false);
    let result = h.switch_to_parent(&child, &ElementKey::null("Root2"), false, true, None);
    assert!(matches!(result, Err(HierarchyError::Cycle { .. })));
    assert_eq!(h.parent_weights(&child, false), before);
    assert_eq!(events.load(Ordering::SeqCst), 0);
}

#[test]
fn switch_keeps_global_and_moves_weight() {
    let mut h = biped();
    let ctrl = ElementKey::control("hand_l_ctrl");
    let before = h.global_transform(&ctrl, false).unwrap();
    h.switch_to_parent(&ctrl, &ElementKey::null("world_space_anchor"), false, false, None)
        .unwrap();
    let after = h.global_transform(&ctrl, false).unwrap();
    assert!(after.approx_eq(&before, 1e-3));
    assert_eq!(h.active_parent(&ctrl, false), Some(ElementKey::null("world_space_anchor")));
    let weights = h.parent_weights(&ctrl, false);
    assert_eq!(weights.len(), 2);
    assert!(weights[0].1.is_almost_zero());
    assert_eq!(weights[1].1, ElementWeight::FULL);

    h.switch_to_parent(&ctrl, &ElementKey::default_parent(), false, false, None)
        .unwrap();
    assert_eq!(h.active_parent(&ctrl, false), Some(ElementKey::bone("spine_01")));
    assert!(h.global_transform(&ctrl, false).unwrap().approx_eq(&before, 1e-3));
}

#[test]
fn float_control_clamps_to_limits() {
    let mut h = biped();
    let blend = ElementKey::control("ik_blend");
    h.set_control_value(&blend, ControlValue::Float(1.5), ControlValueType::Current, true)
        .unwrap();
    assert_eq!(
        h.control_value(&blend, ControlValueType::Current).unwrap(),
        ControlValue::Float(1.0)
    );
    h.set_control_value(&blend, ControlValue::Float(-3.0), ControlValueType::Current, true)
        .unwrap();
    assert_eq!(
        h.control_value(&blend, ControlValueType::Current).unwrap(),
        ControlValue::Float(0.0)
    );
}

#[test]
fn rotator_control_clamps_roll_only_where_enabled() {
    let mut h = biped();
    let look = ElementKey::control("head_look");
    h.set_control_value(
        &look,
        ControlValue::Vector(Rotator::new(0.0, 0.0, 80.0).euler()),
        ControlValueType::Current,
        true,
    )
    .unwrap();
    let value = h
        .control_value(&look, ControlValueType::Current)
        .unwrap()
        .as_rotator()
        .unwrap();
    assert_abs_diff_eq!(value.roll, 45.0, epsilon = 1e-2);
}

#[test]
fn instance_mirrors_writes_on_its_template() {
    let template = shared(biped());
    let instance = shared(read_hierarchy(&template).duplicate());
    write_hierarchy(&template).register_listening_hierarchy(&instance);
    write_hierarchy(&instance).set_default_hierarchy(&template);

    let pelvis = ElementKey::bone("pelvis");
    let moved = Transform::from_translation(Vector3::new(0.0, 0.0, 90.0));
    write_hierarchy(&template)
        .set_local_transform(&pelvis, moved, true, true)
        .unwrap();
    assert!(read_hierarchy(&instance)
        .local_transform(&pelvis, true)
        .unwrap()
        .approx_eq(&moved, 1e-6));

    write_hierarchy(&instance)
        .set_local_transform(&pelvis, Transform::identity(), true, true)
        .unwrap();
    write_hierarchy(&instance).reset_to_default().unwrap();
    assert!(read_hierarchy(&instance)
        .local_transform(&pelvis, true)
        .unwrap()
        .approx_eq(&moved, 1e-6));
}
