use std::sync::Arc;

use approx::assert_relative_eq;
use armature_anim_host::{
    propagate_input_properties, validate_class_swap, AnimNodeControlRig, AnimNodeSettings, AnimPose, CurveMapping,
    HostError, HostProperty, ReferenceSkeleton, RigClass,
};
use armature_api_core::{ControlValue, ElementKey, Vector3};
use armature_hierarchy_core::{read_hierarchy, ControlValueType};
use armature_rig_core::RigDefinition;
use armature_vm_core::VmValue;
use serde_json::{json, Value};

fn arm_json() -> Value {
    let text = armature_test_fixtures::rigs::json("arm_rig").unwrap();
    let mut rig: Value = serde_json::from_str(&text).unwrap();
    rig["hierarchy"]["elements"].as_array_mut().unwrap().push(json!({
        "type": "Control", "name": "fist", "parent": "Bone:root", "settings": { "control_type": "Float" }
    }));
    rig["program"]["variables"] = json!({
        "reach": { "value": { "kind": "float", "value": 0.0 }, "public": true },
        "hidden": { "value": { "kind": "float", "value": 0.0 } }
    });
    rig
}

fn class_from(rig: Value) -> Arc<RigClass> {
    let definition: RigDefinition = serde_json::from_value(rig).unwrap();
    Arc::new(RigClass::from_definition(&definition).unwrap())
}

fn skeleton() -> ReferenceSkeleton {
    armature_test_fixtures::skeletons::load("arm_skeleton").unwrap()
}

fn input(serial: u64) -> AnimPose {
    AnimPose::new(skeleton().reference_pose(serial))
        .with_curve("eye_blink", 0.25)
        .with_curve("grip", 0.75)
}

fn settings() -> AnimNodeSettings {
    AnimNodeSettings {
        input_curve_mappings: vec![CurveMapping::new("eye_blink", "blink"), CurveMapping::new("grip", "fist")],
        output_curve_mappings: vec![CurveMapping::new("blink", "blink_out"), CurveMapping::new("fist", "fist_out")],
        exposed_controls: vec!["hand_ctrl".to_string()],
        ..AnimNodeSettings::default()
    }
}

fn local(pose: &AnimPose, bone: &str) -> Vector3<f32> {
    pose.pose.find(bone).unwrap().local.translation
}

#[test]
fn rig_output_follows_the_control() {
    let mut node = AnimNodeControlRig::new(class_from(arm_json()), settings()).unwrap();
    let out = node.evaluate_any_thread(&input(1));

    let h = read_hierarchy(node.rig().hierarchy());
    let ctrl = h.global_transform(&ElementKey::control("hand_ctrl"), false).unwrap();
    let hand = h.global_transform(&ElementKey::bone("hand"), false).unwrap();
    assert_relative_eq!(hand.translation, ctrl.translation, epsilon = 1e-4);
    drop(h);

    assert_relative_eq!(local(&out, "spine"), Vector3::new(0.0, 0.0, 110.0), epsilon = 1e-5);
    assert_relative_eq!(local(&out, "hand"), Vector3::new(23.0, 0.0, 0.0), epsilon = 1e-4);
    assert_relative_eq!(
        local(&out, "hand"),
        node.bone_transform("hand").unwrap().translation,
        epsilon = 1e-5
    );
    assert_eq!(out.curve("blink_out"), Some(0.25));
    assert_eq!(out.curve("fist_out"), Some(0.75));
}

#[test]
fn bone_cache_follows_the_container_serial() {
    let mut node = AnimNodeControlRig::new(class_from(arm_json()), settings()).unwrap();
    node.evaluate_any_thread(&input(1));

    let mut hand_only = input(2);
    hand_only.pose.bones.retain(|bone| bone.name == "hand");
    let out = node.evaluate_any_thread(&hand_only);
    assert_eq!(out.pose.bones.len(), 1);
    assert_relative_eq!(
        out.pose.bones[0].local.translation,
        node.bone_transform("hand").unwrap().translation,
        epsilon = 1e-5
    );
    assert_relative_eq!(
        node.bone_transform("root").unwrap().translation,
        Vector3::new(0.0, 0.0, 0.0),
        epsilon = 1e-6
    );
    assert!(matches!(node.bone_transform("tail"), Err(HostError::UnknownBone(_))));
}

#[test]
fn properties_land_on_controls_then_public_variables() {
    let class = class_from(arm_json());
    let mut rig = class.instantiate().unwrap();
    let properties = [
        ("ik_enabled", HostProperty::Bool(true)),
        ("hand_ctrl", HostProperty::Float(1.0)),
        ("reach", HostProperty::Float(2.0)),
        ("hidden", HostProperty::Float(3.0)),
        ("label", HostProperty::Name("left".into())),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    assert_eq!(propagate_input_properties(&mut rig, &properties), 2);
    assert_eq!(
        rig.control_value("ik_enabled", ControlValueType::Current).unwrap(),
        ControlValue::Bool(true)
    );
    assert_eq!(rig.variable("reach"), Some(VmValue::Float(2.0)));
    assert_eq!(rig.variable("hidden"), Some(VmValue::Float(0.0)));
}

#[test]
fn node_pushes_properties_every_frame() {
    let mut node = AnimNodeControlRig::new(class_from(arm_json()), settings()).unwrap();
    node.set_property("reach", HostProperty::Float(4.0));
    node.evaluate_any_thread(&input(1));
    assert_eq!(node.rig().variable("reach"), Some(VmValue::Float(4.0)));
}

#[test]
fn swap_checks_report_what_is_missing() {
    let class = class_from(arm_json());
    let rig = class.instantiate().unwrap();
    let exposed = vec!["hand_ctrl".to_string()];
    assert!(validate_class_swap(&rig, &class_from(arm_json()), &exposed).is_ok());

    let mut no_reach = arm_json();
    no_reach["program"]["variables"] = json!({});
    let err = validate_class_swap(&rig, &class_from(no_reach), &exposed).unwrap_err();
    assert!(matches!(err, HostError::IncompatibleVariable { ref name, .. } if name == "reach"));
    assert_eq!(err.category(), "class_swap");

    let mut no_blink = arm_json();
    no_blink["hierarchy"]["elements"]
        .as_array_mut()
        .unwrap()
        .retain(|element| element["name"] != "blink");
    let err = validate_class_swap(&rig, &class_from(no_blink), &exposed).unwrap_err();
    assert_eq!(
        err,
        HostError::MissingElement {
            class: "arm_rig".to_string(),
            key: ElementKey::curve("blink"),
        }
    );

    let mut float_hand = arm_json();
    for element in float_hand["hierarchy"]["elements"].as_array_mut().unwrap() {
        if element["name"] == "hand_ctrl" {
            element["settings"]["control_type"] = json!("Float");
        }
    }
    let err = validate_class_swap(&rig, &class_from(float_hand), &exposed).unwrap_err();
    assert!(matches!(err, HostError::IncompatibleControl { ref name, .. } if name == "hand_ctrl"));
}

#[test]
fn rejected_swap_falls_back_to_the_default_class() {
    let original = class_from(arm_json());
    let mut renamed = arm_json();
    renamed["name"] = json!("arm_rig_v2");
    let compatible = class_from(renamed);
    let mut broken = arm_json();
    broken["program"]["variables"] = json!({});
    let incompatible = class_from(broken);

    let mut node = AnimNodeControlRig::new(Arc::clone(&original), settings()).unwrap();
    node.set_rig_class(Arc::clone(&compatible));
    node.evaluate_any_thread(&input(1));
    assert!(Arc::ptr_eq(node.class(), &compatible));
    assert_eq!(node.rig().name(), "arm_rig_v2");

    node.set_rig_class(incompatible);
    node.evaluate_any_thread(&input(1));
    assert!(Arc::ptr_eq(node.class(), &original));
}

#[test]
fn failed_evaluation_holds_the_last_good_pose() {
    let mut failing = arm_json();
    failing["program"]["events"]["Forward"]["nodes"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "stop", "type": "fail", "params": { "message": "broken" } }));

    let mut node = AnimNodeControlRig::new(class_from(arm_json()), settings()).unwrap();
    let good = node.evaluate_any_thread(&input(1));

    node.set_rig_class(class_from(failing));
    let mut moved = input(1);
    moved.pose.bones[1].local.translation = Vector3::new(0.0, 0.0, 500.0);
    let held = node.evaluate_any_thread(&moved);
    assert_eq!(held, good);

    // A new bone container cannot reuse the held pose.
    let passed = node.evaluate_any_thread(&input(3));
    assert_eq!(passed, input(3));
}

#[test]
fn reference_skeleton_survives_class_swaps() {
    let mut node = AnimNodeControlRig::new(class_from(arm_json()), settings()).unwrap();
    assert_eq!(node.set_reference_skeleton(skeleton()), 5);
    node.evaluate_any_thread(&input(1));
    let spine = ElementKey::bone("spine");
    let initial = read_hierarchy(node.rig().hierarchy()).global_transform(&spine, true).unwrap();
    assert_relative_eq!(initial.translation, Vector3::new(0.0, 0.0, 110.0), epsilon = 1e-5);

    let mut renamed = arm_json();
    renamed["name"] = json!("arm_rig_v2");
    node.set_rig_class(class_from(renamed));
    node.evaluate_any_thread(&input(1));
    let initial = read_hierarchy(node.rig().hierarchy()).global_transform(&spine, true).unwrap();
    assert_relative_eq!(initial.translation, Vector3::new(0.0, 0.0, 110.0), epsilon = 1e-5);
}
