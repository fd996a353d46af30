use std::sync::Arc;

use approx::assert_relative_eq;
use armature_api_core::{ControlValue, ElementKey, Vector3};
use armature_hierarchy_core::{
    ControlValueType, ElementKeyRedirector, HierarchyDefinition, HierarchyError, HierarchySettings,
    RigHierarchy,
};
use armature_vm_core::{
    events, ExecuteContext, ExecuteResult, Report, RigProgram, RigVm, Severity, VmError, VmValue,
};

fn biped() -> RigHierarchy {
    let def: HierarchyDefinition = armature_test_fixtures::hierarchies::load("biped").unwrap();
    def.build().unwrap()
}

fn vm(json: &str) -> RigVm {
    RigVm::from_program(&RigProgram::from_json_str(json).unwrap()).unwrap()
}

fn run(vm: &mut RigVm, h: &mut RigHierarchy, event: &str) -> (ExecuteResult, Vec<Report>) {
    let mut reports = Vec::new();
    let result = {
        let mut ctx = ExecuteContext::new(h, event, &mut reports);
        vm.execute(&mut ctx)
    };
    (result, reports)
}

#[test]
fn units_run_in_data_flow_order() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"set","type":"set_transform","params":{"item":"Null:world_space_anchor"},
         "inputs":{"value":{"node_id":"make"}}},
        {"id":"make","type":"make_transform","inputs":{"translation":{"node_id":"offset"}}},
        {"id":"offset","type":"constant","params":{"value":{"kind":"vector","value":[1,2,3]}}}
    ]}}}"#);
    let mut h = biped();
    let (result, reports) = run(&mut vm, &mut h, events::FORWARD);
    assert_eq!(result, ExecuteResult::Succeeded);
    assert!(reports.is_empty(), "{reports:?}");
    let anchor = h
        .global_transform(&ElementKey::null("world_space_anchor"), false)
        .unwrap();
    assert_relative_eq!(anchor.translation, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-5);
}

#[test]
fn local_write_carries_children() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"set","type":"set_transform","params":{
            "item":"Bone:lowerarm_l","space":"local",
            "value":{"kind":"transform","value":{"translation":[25,0,10]}}}},
        {"id":"get","type":"get_transform","params":{"item":"Bone:hand_l"},
         "inputs":{"after":{"node_id":"set"}}},
        {"id":"store","type":"set_variable","params":{"name":"hand"},
         "inputs":{"value":{"node_id":"get"}}}
    ]}},
    "variables":{"hand":{"value":{"kind":"transform","value":{}}}}}"#);
    let mut h = biped();
    let (result, _) = run(&mut vm, &mut h, events::FORWARD);
    assert!(result.succeeded());
    let hand = vm.variable("hand").and_then(VmValue::as_transform).unwrap();
    assert_relative_eq!(hand.translation, Vector3::new(65.0, 0.0, 160.0), epsilon = 1e-4);
}

#[test]
fn half_weight_blends_with_current() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"set","type":"set_transform","params":{
            "item":"Null:world_space_anchor","weight":0.5,
            "value":{"kind":"transform","value":{"translation":[10,0,0]}}}}
    ]}}}"#);
    let mut h = biped();
    run(&mut vm, &mut h, events::FORWARD);
    let anchor = h
        .global_transform(&ElementKey::null("world_space_anchor"), false)
        .unwrap();
    assert_relative_eq!(anchor.translation, Vector3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
}

#[test]
fn control_writes_are_limited() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"set","type":"set_control_value","params":{
            "item":"Control:ik_blend","value":{"kind":"float","value":3.0}}},
        {"id":"bad","type":"set_control_value","params":{
            "item":"Control:ik_enabled","value":{"kind":"transform","value":{}}}}
    ]}}}"#);
    let mut h = biped();
    let (result, reports) = run(&mut vm, &mut h, events::FORWARD);
    assert!(result.succeeded());
    assert_eq!(
        h.control_value(&ElementKey::control("ik_blend"), ControlValueType::Current)
            .unwrap(),
        ControlValue::Float(1.0)
    );
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Warning);
    assert_eq!(reports[0].node, "bad");
}

#[test]
fn hierarchy_edits_only_during_construction() {
    let program = r#"{"events":{
        "Construction":{"nodes":[
            {"id":"add","type":"add_null","params":{"name":"look_target","parent":"Bone:head",
             "space":"local","value":{"kind":"transform","value":{"translation":[0,50,0]}}}}
        ]},
        "Forward":{"nodes":[
            {"id":"add","type":"add_null","params":{"name":"late_space"}}
        ]}
    }}"#;
    let mut vm = vm(program);
    let mut h = biped();

    let (result, reports) = run(&mut vm, &mut h, events::CONSTRUCTION);
    assert!(result.succeeded());
    assert!(reports.is_empty());
    let target = ElementKey::null("look_target");
    assert!(h.find(&target).unwrap().is_procedural());
    let global = h.global_transform(&target, true).unwrap();
    assert_relative_eq!(global.translation, Vector3::new(0.0, 50.0, 160.0), epsilon = 1e-4);

    let (result, reports) = run(&mut vm, &mut h, events::FORWARD);
    assert!(result.succeeded());
    assert!(!h.contains(&ElementKey::null("late_space")));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Error);
}

#[test]
fn procedural_limit_stops_additions() {
    let mut vm = vm(r#"{"events":{"Construction":{"nodes":[
        {"id":"first","type":"add_curve","params":{"name":"extra_a"}},
        {"id":"second","type":"add_curve","params":{"name":"extra_b"}}
    ]}}}"#);
    let mut h = biped();
    let limit = h.len() + 1;
    let mut reports = Vec::new();
    let result = {
        let mut ctx = ExecuteContext::new(&mut h, events::CONSTRUCTION, &mut reports)
            .with_settings(HierarchySettings {
                procedural_element_limit: limit,
            });
        vm.execute(&mut ctx)
    };
    assert!(result.succeeded());
    assert!(h.contains(&ElementKey::curve("extra_a")));
    assert!(!h.contains(&ElementKey::curve("extra_b")));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Error);
    assert!(reports[0].message.contains("limit"));
}

#[test]
fn failing_unit_aborts_without_rollback() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"smile","type":"set_curve_value","params":{"item":"Curve:smile","value":{"kind":"float","value":0.5}}},
        {"id":"stop","type":"fail","params":{"message":"solver diverged"},"inputs":{"after":{"node_id":"smile"}}},
        {"id":"blink","type":"set_curve_value","params":{"item":"Curve:blink_l","value":{"kind":"float","value":1.0}},
         "inputs":{"after":{"node_id":"stop"}}}
    ]}}}"#);
    let mut h = biped();
    let (result, reports) = run(&mut vm, &mut h, events::FORWARD);
    assert_eq!(result, ExecuteResult::Failed);
    assert_eq!(h.curve_value(&ElementKey::curve("smile")), Some(0.5));
    assert!(!h.is_curve_value_set(&ElementKey::curve("blink_l")));
    assert_eq!(reports.last().unwrap().message, "solver diverged");
}

#[test]
fn variables_keep_their_kind() {
    let mut vm = vm(r#"{
        "events":{"Forward":{"nodes":[
            {"id":"read","type":"get_variable","params":{"name":"amount"}},
            {"id":"write","type":"set_curve_value","params":{"item":"Curve:smile"},
             "inputs":{"value":{"node_id":"read"}}}
        ]}},
        "variables":{
            "amount":{"value":{"kind":"float","value":0.0},"public":true},
            "scratch":{"value":{"kind":"int","value":0}}
        }}"#);
    vm.set_variable("amount", VmValue::Float(0.25)).unwrap();
    assert!(matches!(
        vm.set_variable("amount", VmValue::Bool(true)),
        Err(VmError::VariableTypeMismatch { .. })
    ));
    assert!(matches!(
        vm.set_variable("missing", VmValue::Float(1.0)),
        Err(VmError::UnknownVariable(_))
    ));
    let public: Vec<&str> = vm.public_variables().map(|(name, _)| name).collect();
    assert_eq!(public, vec!["amount"]);

    let mut h = biped();
    run(&mut vm, &mut h, events::FORWARD);
    assert_eq!(h.curve_value(&ElementKey::curve("smile")), Some(0.25));
}

#[test]
fn shared_bytecode_has_separate_memory() {
    let original = vm(r#"{"events":{},"variables":{"gain":{"value":{"kind":"float","value":1.0}}}}"#);
    let mut copy = original.share();
    assert!(Arc::ptr_eq(original.bytecode(), copy.bytecode()));
    copy.set_variable("gain", VmValue::Float(4.0)).unwrap();
    assert_eq!(original.variable("gain"), Some(&VmValue::Float(1.0)));
    assert_eq!(copy.variable("gain"), Some(&VmValue::Float(4.0)));
}

#[test]
fn reinitializing_keeps_public_inputs() {
    let mut vm = vm(r#"{"events":{},"variables":{
        "gain":{"value":{"kind":"float","value":1.0},"public":true},
        "scratch":{"value":{"kind":"int","value":0}}
    }}"#);
    assert!(vm.is_initialized());
    vm.set_variable("gain", VmValue::Float(3.0)).unwrap();
    vm.set_variable("scratch", VmValue::Int(7)).unwrap();
    vm.initialize();
    assert_eq!(vm.variable("gain"), Some(&VmValue::Float(3.0)));
    assert_eq!(vm.variable("scratch"), Some(&VmValue::Int(0)));
}

#[test]
fn dependency_map_blocks_parent_cycles() {
    let vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"hand","type":"get_transform","params":{"item":"Bone:hand_l"}},
        {"id":"follow","type":"set_transform","params":{"item":"Null:world_space_anchor"},
         "inputs":{"value":{"node_id":"hand"}}}
    ]}}}"#);
    let deps = vm.dependency_map(None);
    let anchor = ElementKey::null("world_space_anchor");
    let hand = ElementKey::bone("hand_l");
    assert_eq!(deps.get(&anchor), Some(&vec![hand.clone()]));

    let mut h = biped();
    let err = h
        .switch_to_parent(&hand, &anchor, false, false, Some(&deps))
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));
    h.switch_to_parent(&hand, &anchor, false, false, None).unwrap();
}

#[test]
fn redirected_keys_reach_the_target() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[
        {"id":"set","type":"set_curve_value","params":{"item":"Curve:smile","value":{"kind":"float","value":0.7}}}
    ]}}}"#);
    let mut redirector = ElementKeyRedirector::new();
    redirector.add(ElementKey::curve("smile"), ElementKey::curve("blink_l"));
    let mut h = biped();
    let mut reports = Vec::new();
    {
        let mut ctx = ExecuteContext::new(&mut h, events::FORWARD, &mut reports).with_redirector(&redirector);
        vm.execute(&mut ctx);
    }
    assert_eq!(h.curve_value(&ElementKey::curve("blink_l")), Some(0.7));
    assert!(!h.is_curve_value_set(&ElementKey::curve("smile")));
}

#[test]
fn metadata_units_round_trip_through_the_hierarchy() {
    let mut vm = vm(r#"{"events":{"Construction":{"nodes":[
        {"id":"side","type":"set_metadata","params":{"item":"Bone:hand_l","name":"side","value":{"kind":"name","value":"left"}}},
        {"id":"tag","type":"add_tag","params":{"item":"Bone:hand_l","name":"ik_tip"}},
        {"id":"read","type":"get_metadata","params":{"item":"Bone:hand_l","name":"side"},
         "inputs":{"after":{"node_id":"side"}}},
        {"id":"store","type":"set_variable","params":{"name":"side"},"inputs":{"value":{"node_id":"read"}}}
    ]}},
    "variables":{"side":{"value":{"kind":"name","value":""}}}}"#);
    let mut h = biped();
    run(&mut vm, &mut h, events::CONSTRUCTION);
    assert!(h.has_tag(&ElementKey::bone("hand_l"), "ik_tip"));
    assert_eq!(vm.variable("side"), Some(&VmValue::Name("left".to_string())));
}

#[test]
fn compile_errors_surface() {
    let cyclic = RigProgram::from_json_str(
        r#"{"events":{"Forward":{"nodes":[
            {"id":"a","type":"float_add","inputs":{"a":{"node_id":"b"}}},
            {"id":"b","type":"float_add","inputs":{"a":{"node_id":"a"}}}
        ]}}}"#,
    )
    .unwrap();
    let err = RigVm::from_program(&cyclic).unwrap_err();
    assert!(matches!(err, VmError::Cycle { .. }));
    assert_eq!(err.category(), "compile");

    let dangling = RigProgram::from_json_str(
        r#"{"events":{"Forward":{"nodes":[
            {"id":"a","type":"float_add","inputs":{"a":{"node_id":"ghost"}}}
        ]}}}"#,
    )
    .unwrap();
    assert!(matches!(
        RigVm::from_program(&dangling),
        Err(VmError::UnknownInputNode { .. })
    ));
}

#[test]
fn unknown_events_are_a_no_op() {
    let mut vm = vm(r#"{"events":{"Forward":{"nodes":[]}}}"#);
    assert!(vm.supports_event(events::FORWARD));
    assert!(!vm.supports_event(events::INVERSE));
    let mut h = biped();
    let (result, reports) = run(&mut vm, &mut h, events::INVERSE);
    assert!(result.succeeded());
    assert!(reports.is_empty());
}
