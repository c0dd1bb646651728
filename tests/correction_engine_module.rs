use router_supervisor::correction::{
    clamp_value, ClampOutcome, CorrectionEngine, CorrectionRules, ParamRange,
};
use router_supervisor::model::{
    AuditKind, AuditTrail, Mode, ObjectInfo, RequiredMode, SceneContext, SelectionCounts, ToolCall,
};
use serde_json::{json, Map, Value};

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn edit_scene_with_selection() -> SceneContext {
    SceneContext::new(Mode::Edit)
        .with_object("Cube", ObjectInfo::default())
        .with_active("Cube")
        .with_selection(SelectionCounts::new(8, 12, 6))
}

#[test]
fn correction_engine_module_switches_mode_before_selecting() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let corrected = engine.correct(
        "mesh_extrude_region",
        &params(json!({ "move": [0.0, 0.0, 1.0] })),
        &SceneContext::new(Mode::Object),
        &mut audit,
    );

    assert_eq!(
        corrected.pre_steps,
        vec![
            ToolCall::from_json("system_set_mode", json!({ "mode": "EDIT" })),
            ToolCall::from_json("mesh_select", json!({ "action": "all" })),
        ]
    );
    assert_eq!(
        corrected.call,
        ToolCall::from_json("mesh_extrude_region", json!({ "move": [0.0, 0.0, 1.0] }))
    );
    assert_eq!(corrected.reasons.len(), 2);
    let kinds = audit
        .entries()
        .iter()
        .map(|entry| entry.kind)
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec![AuditKind::ModeSwitch, AuditKind::SelectionFix]);
}

#[test]
fn correction_engine_module_clamps_out_of_range_offset_to_float_bound() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let corrected = engine.correct(
        "mesh_bevel",
        &params(json!({ "offset": 50.0, "segments": 3 })),
        &edit_scene_with_selection(),
        &mut audit,
    );

    assert!(corrected.pre_steps.is_empty());
    assert_eq!(corrected.call.param("offset"), Some(&json!(10.0)));
    assert_eq!(corrected.call.param("segments"), Some(&json!(3)));
    assert_eq!(audit.of_kind(AuditKind::Clamp).count(), 1);
    assert!(corrected.reasons[0].contains("mesh_bevel.offset"));
}

#[test]
fn correction_engine_module_leaves_conforming_calls_untouched() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let original = ToolCall::from_json("mesh_bevel", json!({ "offset": 0.2, "segments": 2 }));
    let corrected = engine.correct_call(&original, &edit_scene_with_selection(), &mut audit);

    assert!(!corrected.is_modified_from(&original));
    assert!(corrected.reasons.is_empty());
    assert!(audit.is_empty());
}

#[test]
fn correction_engine_module_passes_unknown_tools_through() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let original = ToolCall::from_json("render_preview", json!({ "samples": 100000 }));
    let corrected = engine.correct_call(&original, &SceneContext::new(Mode::Sculpt), &mut audit);

    assert!(!corrected.is_modified_from(&original));
    assert!(audit.is_empty());
}

#[test]
fn correction_engine_module_resolves_exact_entries_before_prefixes() {
    let rules = CorrectionRules::blender_defaults();
    assert_eq!(
        rules.required_mode("mesh_boolean"),
        Some(RequiredMode::Exactly(Mode::Object))
    );
    assert_eq!(
        rules.required_mode("mesh_inset"),
        Some(RequiredMode::Exactly(Mode::Edit))
    );
    assert_eq!(rules.required_mode("scene_list_objects"), Some(RequiredMode::Any));
    assert_eq!(rules.required_mode("render_preview"), None);
}

#[test]
fn correction_engine_module_any_mode_never_switches() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let corrected = engine.correct(
        "scene_list_objects",
        &Map::new(),
        &SceneContext::new(Mode::Sculpt),
        &mut audit,
    );
    assert!(corrected.pre_steps.is_empty());
    assert!(audit.is_empty());
}

#[test]
fn correction_engine_module_notes_non_numeric_ranged_values() {
    let engine = CorrectionEngine::default();
    let mut audit = AuditTrail::new();
    let corrected = engine.correct(
        "mesh_bevel",
        &params(json!({ "offset": "wide" })),
        &edit_scene_with_selection(),
        &mut audit,
    );
    assert_eq!(corrected.call.param("offset"), Some(&json!("wide")));
    assert!(corrected.reasons.is_empty());
    assert_eq!(audit.of_kind(AuditKind::Clamp).count(), 1);
}

#[test]
fn correction_engine_module_uses_configured_switch_tool_names() {
    let rules: CorrectionRules = serde_yaml::from_str(
        r#"
mode_switch_tool: set_mode
mode_param: target
select_tool: select
select_all_params:
  what: everything
mode_prefixes:
  poly_: EDIT
selection_required: [poly_extrude]
param_ranges:
  - tool: poly_extrude
    param: depth
    min: 0.0
    max: 2.0
"#,
    )
    .expect("rules");
    rules.validate().expect("valid rules");

    let engine = CorrectionEngine::new(rules);
    let mut audit = AuditTrail::new();
    let corrected = engine.correct(
        "poly_extrude",
        &params(json!({ "depth": -1 })),
        &SceneContext::new(Mode::Object),
        &mut audit,
    );

    assert_eq!(
        corrected.pre_steps,
        vec![
            ToolCall::from_json("set_mode", json!({ "target": "EDIT" })),
            ToolCall::from_json("select", json!({ "what": "everything" })),
        ]
    );
    assert_eq!(corrected.call.param("depth"), Some(&json!(0)));
}

#[test]
fn correction_engine_module_rejects_inverted_ranges() {
    let mut rules = CorrectionRules::empty();
    rules
        .param_ranges
        .push(ParamRange::new("mesh_bevel", "offset", 2.0, 1.0));
    let err = rules.validate().expect_err("inverted range");
    assert!(err.contains("mesh_bevel.offset"));
}

#[test]
fn correction_engine_module_clamps_vectors_elementwise() {
    assert_eq!(
        clamp_value(&json!([150, -3, 20]), -100.0, 100.0),
        ClampOutcome::Clamped(json!([100, -3, 20]))
    );
    assert_eq!(clamp_value(&json!(null), 0.0, 1.0), ClampOutcome::NotNumeric);
}

#[test]
fn correction_engine_module_integer_inputs_clamp_to_the_nearest_bound() {
    let engine = CorrectionEngine::default();
    let scene = edit_scene_with_selection();

    let mut audit = AuditTrail::new();
    let bevel = engine.correct("mesh_bevel", &params(json!({ "offset": 0 })), &scene, &mut audit);
    assert_eq!(bevel.call.param("offset"), Some(&json!(0.001)));

    for distance in [json!(0), json!(-5)] {
        let merged = engine.correct(
            "mesh_merge_by_distance",
            &params(json!({ "distance": distance })),
            &scene,
            &mut audit,
        );
        assert_eq!(merged.call.param("distance"), Some(&json!(0.00001)));
    }

    let segments = engine.correct("mesh_bevel", &params(json!({ "segments": 40 })), &scene, &mut audit);
    assert_eq!(segments.call.param("segments"), Some(&json!(10)));
}
