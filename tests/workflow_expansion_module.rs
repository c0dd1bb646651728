use router_supervisor::config::WorkflowDocument;
use router_supervisor::correction::{CorrectionEngine, CorrectionRules};
use router_supervisor::model::{AuditKind, Mode, Plan, SceneContext, ToolCall};
use router_supervisor::overrides::{OverrideEngine, OverrideRule, ReplacementSpec};
use router_supervisor::pattern::{PatternDetector, ShapeHeuristic};
use router_supervisor::pipeline::CallPipeline;
use router_supervisor::shared::ids::RuleId;
use router_supervisor::workflow::{
    ExpansionEngine, ExpansionLimits, ModifierMatchMode, WorkflowDefinition, WorkflowRegistry,
};
use serde_json::{json, Map, Value};

const PICNIC_TABLE: &str = r#"
name: picnic_table_workflow
description: Picnic table with attached benches
category: furniture
sample_prompts:
  - build a picnic table
parameters:
  - name: leg_angle_left
    default: 0.32
    range: [-1.0, 1.0]
  - name: leg_angle_right
    default: -0.32
    range: [-1.0, 1.0]
  - name: table_length
    default: 2.0
    range: [0.5, 5.0]
modifiers:
  straight:
    leg_angle_left: 0
    leg_angle_right: 0
steps:
  - tool: modeling_create_primitive
    params:
      primitive_type: CUBE
      name: Table_Top
      scale: ["$table_length", 0.8, 0.05]
      location: [0, 0, 0.75]
  - tool: modeling_create_primitive
    params:
      primitive_type: CUBE
      name: Leg_Left
      scale: [0.05, 0.4, 0.35]
  - tool: modeling_transform_object
    params:
      name: Leg_Left
      rotation: [0, "$leg_angle_left", 0]
  - tool: modeling_create_primitive
    params:
      primitive_type: CUBE
      name: Leg_Right
      scale: [0.05, 0.4, 0.35]
  - tool: modeling_transform_object
    params:
      name: Leg_Right
      rotation: [0, "$leg_angle_right", 0]
  - tool: modeling_create_primitive
    loop:
      count: 2
      var_name: i
    params:
      primitive_type: CUBE
      name: "Bench_{i}"
      scale: ["$table_length", 0.3, 0.05]
      location: [0, "$CALCULATE(i * 1.2 - 0.6)", 0.45]
  - tool: mesh_bevel
    condition: table_length > 1.5
    params:
      offset: $AUTO_BEVEL
      segments: 2
  - tool: mesh_inset
    condition: table_length > 1.5
    params:
      thickness: 0.01
"#;

fn definition(yaml: &str) -> WorkflowDefinition {
    WorkflowDocument::from_yaml_str(yaml, "inline")
        .expect("document")
        .into_definition()
        .expect("definition")
}

fn registry(yamls: &[&str]) -> WorkflowRegistry {
    WorkflowRegistry::from_definitions(yamls.iter().map(|yaml| definition(yaml))).expect("registry")
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn find<'a>(calls: &'a [ToolCall], tool: &str, name: &str) -> &'a ToolCall {
    calls
        .iter()
        .find(|call| call.name() == tool && call.param("name") == Some(&json!(name)))
        .unwrap_or_else(|| panic!("missing {tool} for {name}"))
}

fn rotation_y(plan: &Plan, leg: &str) -> f64 {
    let calls = plan.flatten();
    let rotation = find(&calls, "modeling_transform_object", leg)
        .param("rotation")
        .cloned()
        .expect("rotation");
    rotation[1].as_f64().expect("numeric rotation")
}

fn expand(
    registry: &WorkflowRegistry,
    workflow: &str,
    explicit: Map<String, Value>,
    prompt: &str,
) -> Plan {
    let pipeline = CallPipeline::default();
    ExpansionEngine::new(registry, &pipeline).expand(
        workflow,
        &explicit,
        prompt,
        &SceneContext::new(Mode::Object),
    )
}

#[test]
fn workflow_expansion_module_uses_defaults_without_modifier() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(&registry, "picnic_table_workflow", Map::new(), "build a picnic table");

    assert!((rotation_y(&plan, "Leg_Left") - 0.32).abs() < 1e-9);
    assert!((rotation_y(&plan, "Leg_Right") + 0.32).abs() < 1e-9);
    assert!(!plan.audit.contains_kind(AuditKind::ModifierMatch));
}

#[test]
fn workflow_expansion_module_modifier_keyword_overrides_defaults() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(
        &registry,
        "picnic_table_workflow",
        Map::new(),
        "picnic table with straight legs",
    );

    assert_eq!(rotation_y(&plan, "Leg_Left"), 0.0);
    assert_eq!(rotation_y(&plan, "Leg_Right"), 0.0);
    assert_eq!(plan.audit.of_kind(AuditKind::ModifierMatch).count(), 1);
}

#[test]
fn workflow_expansion_module_explicit_params_beat_modifiers_and_are_clamped() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(
        &registry,
        "picnic_table_workflow",
        params(json!({ "leg_angle_left": 0.1, "leg_angle_right": -5 })),
        "straight legs",
    );

    assert!((rotation_y(&plan, "Leg_Left") - 0.1).abs() < 1e-9);
    assert_eq!(rotation_y(&plan, "Leg_Right"), -1.0);
    assert!(plan
        .audit
        .of_kind(AuditKind::Clamp)
        .any(|entry| entry.message.contains("leg_angle_right")));
}

#[test]
fn workflow_expansion_module_unrolls_loops_with_interpolated_names() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(&registry, "picnic_table_workflow", Map::new(), "");
    let calls = plan.flatten();

    let bench_0 = find(&calls, "modeling_create_primitive", "Bench_0");
    let bench_1 = find(&calls, "modeling_create_primitive", "Bench_1");
    let y = |call: &ToolCall| call.param("location").expect("location")[1].as_f64().expect("y");
    assert!((y(bench_0) + 0.6).abs() < 1e-9);
    assert!((y(bench_1) - 0.6).abs() < 1e-9);
    assert!(plan.audit.contains_kind(AuditKind::LoopUnroll));
}

#[test]
fn workflow_expansion_module_inserts_mode_switch_and_selection_once() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(&registry, "picnic_table_workflow", Map::new(), "");
    let names = plan.tool_names();

    let bevel = names
        .iter()
        .position(|name| name == "mesh_bevel")
        .expect("bevel");
    assert_eq!(names[bevel - 2], "system_set_mode");
    assert_eq!(names[bevel - 1], "mesh_select");
    assert_eq!(names[bevel + 1], "mesh_inset");
    assert_eq!(names.iter().filter(|name| *name == "system_set_mode").count(), 1);
    assert_eq!(names.iter().filter(|name| *name == "mesh_select").count(), 1);

    let flat = plan.flatten();
    assert_eq!(flat[bevel - 2].param("mode"), Some(&json!("EDIT")));
    let offset = flat[bevel].param("offset").and_then(Value::as_f64).expect("offset");
    assert!((offset - 0.005).abs() < 1e-9, "offset was {offset}");
}

#[test]
fn workflow_expansion_module_false_condition_skips_step() {
    let registry = registry(&[PICNIC_TABLE]);
    let plan = expand(
        &registry,
        "picnic_table_workflow",
        params(json!({ "table_length": 1.0 })),
        "",
    );
    let names = plan.tool_names();
    assert!(!names.iter().any(|name| name == "mesh_bevel"));
    assert!(!names.iter().any(|name| name == "system_set_mode"));
    assert_eq!(plan.audit.of_kind(AuditKind::RuntimeSkip).count(), 2);
}

#[test]
fn workflow_expansion_module_is_deterministic_and_leaves_scene_alone() {
    let registry = registry(&[PICNIC_TABLE]);
    let pipeline = CallPipeline::default();
    let engine = ExpansionEngine::new(&registry, &pipeline);
    let scene = SceneContext::new(Mode::Object);
    let before = scene.clone();

    let first = engine.expand("picnic_table_workflow", &Map::new(), "straight", &scene);
    let second = engine.expand("picnic_table_workflow", &Map::new(), "straight", &scene);

    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(scene, before);
}

#[test]
fn workflow_expansion_module_word_boundary_mode_ignores_partial_words() {
    let registry = registry(&[PICNIC_TABLE]);
    let pipeline = CallPipeline::default();
    let plan = ExpansionEngine::new(&registry, &pipeline)
        .with_modifier_mode(ModifierMatchMode::WordBoundary)
        .expand(
            "picnic_table_workflow",
            &Map::new(),
            "a straightforward table",
            &SceneContext::new(Mode::Object),
        );
    assert!((rotation_y(&plan, "Leg_Left") - 0.32).abs() < 1e-9);
}

const BENCH: &str = r#"
name: bench
defaults:
  seat_height: 0.45
steps:
  - tool: scene_add_marker
    params:
      label: "bench at {seat_height}"
"#;

const GARDEN: &str = r#"
name: garden_set
steps:
  - tool: scene_add_marker
    params:
      label: start
  - include: bench
    params:
      seat_height: 0.5
  - include: missing_piece
"#;

#[test]
fn workflow_expansion_module_includes_expand_inline_with_params() {
    let registry = registry(&[BENCH, GARDEN]);
    let plan = expand(&registry, "garden_set", Map::new(), "");

    let labels = plan
        .flatten()
        .iter()
        .map(|call| call.param("label").cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    assert_eq!(labels, vec![json!("start"), json!("bench at 0.5")]);
    assert!(plan.audit.contains_kind(AuditKind::Include));
    assert!(plan
        .audit
        .of_kind(AuditKind::RuntimeSkip)
        .any(|entry| entry.message.contains("missing_piece")));
}

#[test]
fn workflow_expansion_module_stops_recursive_includes_at_depth_limit() {
    let recursive = r#"
name: fractal
steps:
  - tool: scene_add_marker
  - include: fractal
"#;
    let registry = registry(&[recursive]);
    let plan = expand(&registry, "fractal", Map::new(), "");

    assert_eq!(plan.calls.len(), ExpansionLimits::default().max_include_depth + 1);
    assert_eq!(plan.audit.of_kind(AuditKind::LimitReached).count(), 1);
}

#[test]
fn workflow_expansion_module_caps_loop_iterations_and_total_calls() {
    let looping = r#"
name: scatter
parameters:
  - name: copies
    default: 100
steps:
  - tool: scene_add_marker
    loop:
      count: $copies
    params:
      label: "marker {i}"
"#;
    let registry = registry(&[looping]);
    let pipeline = CallPipeline::default();
    let scene = SceneContext::default();

    let limited = ExpansionEngine::new(&registry, &pipeline).with_limits(ExpansionLimits {
        max_loop_iterations: 3,
        ..ExpansionLimits::default()
    });
    let plan = limited.expand("scatter", &Map::new(), "", &scene);
    assert_eq!(plan.calls.len(), 3);
    assert!(plan.audit.contains_kind(AuditKind::LimitReached));

    let capped = ExpansionEngine::new(&registry, &pipeline).with_limits(ExpansionLimits {
        max_calls: 2,
        ..ExpansionLimits::default()
    });
    let plan = capped.expand("scatter", &params(json!({ "copies": 5 })), "", &scene);
    assert_eq!(plan.calls.len(), 2);
    assert_eq!(plan.audit.of_kind(AuditKind::LimitReached).count(), 1);
}

#[test]
fn workflow_expansion_module_loop_count_from_expression() {
    let looping = r#"
name: legs
parameters:
  - name: pairs
    default: 2
steps:
  - tool: scene_add_marker
    loop:
      count: $CALCULATE(pairs * 2)
      var_name: leg
    params:
      index: $leg
"#;
    let registry = registry(&[looping]);
    let plan = expand(&registry, "legs", Map::new(), "");
    let indices = plan
        .flatten()
        .iter()
        .map(|call| call.param("index").cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    assert_eq!(indices, vec![json!(0), json!(1), json!(2), json!(3)]);

    let skipped = expand(&registry, "legs", params(json!({ "pairs": -1 })), "");
    assert!(skipped.is_empty());
    assert!(skipped.audit.contains_kind(AuditKind::RuntimeSkip));
}

#[test]
fn workflow_expansion_module_unknown_workflow_yields_empty_plan() {
    let registry = registry(&[BENCH]);
    let plan = expand(&registry, "spaceship", Map::new(), "");
    assert!(plan.is_empty());
    assert!(plan.audit.contains_kind(AuditKind::RuntimeSkip));
}

fn labels(plan: &Plan) -> Vec<Value> {
    plan.flatten()
        .iter()
        .map(|call| call.param("label").cloned().unwrap_or(Value::Null))
        .collect()
}

#[test]
fn workflow_expansion_module_loop_condition_sees_the_loop_variable() {
    let tagged = r#"
name: tagged_posts
steps:
  - tool: modeling_create_primitive
    params:
      name: Base
  - tool: scene_tag
    loop:
      count: 3
      var_name: i
    condition: i > 0
    params:
      label: "tag {i}"
"#;
    let registry = registry(&[tagged]);
    let plan = expand(&registry, "tagged_posts", Map::new(), "");

    assert_eq!(
        plan.tool_names(),
        vec!["modeling_create_primitive", "scene_tag", "scene_tag"]
    );
    assert_eq!(labels(&plan)[1..].to_vec(), vec![json!("tag 1"), json!("tag 2")]);
    assert_eq!(plan.audit.of_kind(AuditKind::RuntimeSkip).count(), 1);
    assert!(!plan.audit.contains_kind(AuditKind::UnresolvedReference));
}

#[test]
fn workflow_expansion_module_loop_instances_see_earlier_simulated_effects() {
    let posts = r#"
name: two_posts
steps:
  - tool: modeling_create_primitive
    loop:
      count: 4
      var_name: i
    condition: object_count < 2
    params:
      name: "Post_{i}"
"#;
    let registry = registry(&[posts]);
    let plan = expand(&registry, "two_posts", Map::new(), "");

    let names = plan
        .flatten()
        .iter()
        .map(|call| call.param("name").cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Post_0"), json!("Post_1")]);
    assert_eq!(plan.audit.of_kind(AuditKind::RuntimeSkip).count(), 2);
}

#[test]
fn workflow_expansion_module_condition_follows_simulated_object_count() {
    let staged = r#"
name: staged
steps:
  - tool: scene_tag
    condition: object_count > 0
    params:
      label: before
  - tool: modeling_create_primitive
    params:
      name: Crate
  - tool: scene_tag
    condition: object_count > 0
    params:
      label: after
"#;
    let registry = registry(&[staged]);
    let plan = expand(&registry, "staged", Map::new(), "");

    assert_eq!(plan.tool_names(), vec!["modeling_create_primitive", "scene_tag"]);
    assert_eq!(labels(&plan), vec![Value::Null, json!("after")]);
    assert_eq!(plan.audit.of_kind(AuditKind::RuntimeSkip).count(), 1);
}

#[test]
fn workflow_expansion_module_selection_pre_step_satisfies_later_condition() {
    let beveled = r#"
name: beveled_plate
steps:
  - tool: modeling_create_primitive
    params:
      name: Plate
  - tool: scene_tag
    condition: has_selection
    params:
      label: too_early
  - tool: mesh_bevel
    params:
      offset: 0.01
  - tool: scene_tag
    condition: has_selection and current_mode == 'EDIT'
    params:
      label: selected
"#;
    let registry = registry(&[beveled]);
    let plan = expand(&registry, "beveled_plate", Map::new(), "");

    assert_eq!(
        plan.tool_names(),
        vec![
            "modeling_create_primitive",
            "system_set_mode",
            "mesh_select",
            "mesh_bevel",
            "scene_tag"
        ]
    );
    assert_eq!(labels(&plan)[4], json!("selected"));
    assert!(plan
        .audit
        .of_kind(AuditKind::RuntimeSkip)
        .any(|entry| entry.message.contains("has_selection")));
}

#[test]
fn workflow_expansion_module_loop_values_bind_in_declared_order() {
    let sides = r#"
name: side_legs
steps:
  - tool: modeling_create_primitive
    loop:
      values: [Left, Right, 2.5]
      var_name: side
    params:
      name: "Leg_{side}"
      label: $side
"#;
    let registry = registry(&[sides]);
    let plan = expand(&registry, "side_legs", Map::new(), "");

    let names = plan
        .flatten()
        .iter()
        .map(|call| call.param("name").cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Leg_Left"), json!("Leg_Right"), json!("Leg_2.5")]);
    assert_eq!(labels(&plan), vec![json!("Left"), json!("Right"), json!(2.5)]);
    assert!(plan
        .audit
        .of_kind(AuditKind::LoopUnroll)
        .any(|entry| entry.message.contains("3 instance(s) of `side`")));
}

#[test]
fn workflow_expansion_module_flags_unknown_placeholders() {
    let typo = r#"
name: typo
parameters:
  - name: width
    default: 2
steps:
  - tool: scene_add_marker
    params:
      label: "width {widht}"
"#;
    let registry = registry(&[typo]);
    let plan = expand(&registry, "typo", Map::new(), "");

    assert_eq!(labels(&plan), vec![json!("width {widht}")]);
    assert!(plan
        .audit
        .of_kind(AuditKind::UnresolvedReference)
        .any(|entry| entry.message.contains("{widht}")));
}

struct AlwaysSlot;

impl ShapeHeuristic for AlwaysSlot {
    fn name(&self) -> &str {
        "slot_like"
    }

    fn score(&self, _context: &SceneContext, _history: &[ToolCall]) -> Option<(f32, Value)> {
        Some((0.9, json!({})))
    }
}

#[test]
fn workflow_expansion_module_call_cap_never_splits_a_replacement_sequence() {
    let mut detector = PatternDetector::new(0.5);
    detector.register(Box::new(AlwaysSlot));
    let mut overrides = OverrideEngine::new();
    overrides
        .register_rule(
            OverrideRule::new(
                RuleId::parse("slot_cut").expect("id"),
                "cut_slot",
                vec![
                    ReplacementSpec::new("sink_region"),
                    ReplacementSpec::new("soften_rim"),
                ],
            )
            .on_pattern("slot_like", 0.5),
        )
        .expect("register");
    let pipeline = CallPipeline::new(
        CorrectionEngine::new(CorrectionRules::empty()),
        detector,
        overrides,
    );
    let slotted = r#"
name: slotted
steps:
  - tool: scene_add_marker
  - tool: cut_slot
"#;
    let registry = registry(&[slotted]);
    let scene = SceneContext::new(Mode::Edit);

    let roomy =
        ExpansionEngine::new(&registry, &pipeline).expand("slotted", &Map::new(), "", &scene);
    assert_eq!(
        roomy.tool_names(),
        vec!["scene_add_marker", "sink_region", "soften_rim"]
    );

    let tight = ExpansionEngine::new(&registry, &pipeline)
        .with_limits(ExpansionLimits {
            max_calls: 2,
            ..ExpansionLimits::default()
        })
        .expand("slotted", &Map::new(), "", &scene);
    assert_eq!(tight.tool_names(), vec!["scene_add_marker"]);
    assert_eq!(tight.audit.of_kind(AuditKind::LimitReached).count(), 1);
}

#[test]
fn workflow_expansion_module_include_fan_out_is_budgeted() {
    let leaf = r#"
name: leaf
steps:
  - tool: scene_add_marker
"#;
    let fan = r#"
name: fan
steps:
  - include: leaf
    loop:
      count: 10
"#;
    let registry = registry(&[leaf, fan]);
    let pipeline = CallPipeline::default();

    let unbounded = expand(&registry, "fan", Map::new(), "");
    assert_eq!(unbounded.calls.len(), 10);

    let plan = ExpansionEngine::new(&registry, &pipeline)
        .with_limits(ExpansionLimits {
            max_includes: 3,
            ..ExpansionLimits::default()
        })
        .expand("fan", &Map::new(), "", &SceneContext::default());
    assert_eq!(plan.calls.len(), 3);
    assert_eq!(plan.audit.of_kind(AuditKind::Include).count(), 3);
    assert_eq!(plan.audit.of_kind(AuditKind::LimitReached).count(), 1);
}
