use proptest::prelude::*;
use router_supervisor::correction::{clamp_value, ClampOutcome, CorrectionEngine};
use router_supervisor::expr::Expr;
use router_supervisor::model::{AuditTrail, Mode, SceneContext, SelectionCounts};
use router_supervisor::pipeline::CallPipeline;
use router_supervisor::shared::ids::WorkflowName;
use router_supervisor::workflow::{
    resolve_variables, ExpansionEngine, ExpansionLimits, LoopSpec, Modifier, ModifierMatchMode,
    WorkflowDefinition, WorkflowRegistry, WorkflowStep,
};
use serde_json::{json, Map, Value};

fn loop_registry(count: u64) -> WorkflowRegistry {
    let definition = WorkflowDefinition::new(
        WorkflowName::parse("marker_row").expect("name"),
        vec![WorkflowStep::tool("scene_add_marker")
            .param("index", Expr::var("i"))
            .repeat(LoopSpec::count(Expr::literal(count), "i"))],
    );
    WorkflowRegistry::from_definitions([definition]).expect("registry")
}

fn layered_definition(default: i64, modifier: i64) -> WorkflowDefinition {
    WorkflowDefinition::new(
        WorkflowName::parse("layered").expect("name"),
        vec![WorkflowStep::tool("scene_add_marker")],
    )
    .with_default("width", json!(default))
    .with_modifier(Modifier::new("wide", vec![("width".to_string(), json!(modifier))]))
}

proptest! {
    #[test]
    fn clamp_never_leaves_declared_range(
        value in -1.0e6f64..1.0e6,
        low in -100.0f64..100.0,
        span in 0.0f64..100.0,
    ) {
        let high = low + span;
        let input = json!(value);
        let result = match clamp_value(&input, low, high) {
            ClampOutcome::Unchanged => input,
            ClampOutcome::Clamped(clamped) => clamped,
            ClampOutcome::NotNumeric => panic!("numeric input reported as non-numeric"),
        };
        let number = result.as_f64().expect("number");
        prop_assert!(number >= low && number <= high, "{number} outside {low}..{high}");
    }

    #[test]
    fn integer_clamp_lands_on_the_nearest_bound(
        value in -1_000i64..1_000,
        low in -50.0f64..50.0,
        span in 0.0f64..50.0,
    ) {
        let high = low + span;
        if let ClampOutcome::Clamped(clamped) = clamp_value(&json!(value), low, high) {
            let number = clamped.as_f64().expect("number");
            let expected = (value as f64).clamp(low, high);
            prop_assert!((number - expected).abs() < 1e-9, "{value} -> {number}, expected {expected}");
        }
    }

    #[test]
    fn corrected_bevel_offset_stays_in_range(offset in -1.0e4f64..1.0e4) {
        let engine = CorrectionEngine::default();
        let scene = SceneContext::new(Mode::Edit).with_selection(SelectionCounts::new(1, 1, 1));
        let params = Map::from_iter([("offset".to_string(), json!(offset))]);
        let mut audit = AuditTrail::new();
        let corrected = engine.correct("mesh_bevel", &params, &scene, &mut audit);
        let clamped = corrected
            .call
            .param("offset")
            .and_then(Value::as_f64)
            .expect("offset");
        prop_assert!((0.001..=10.0).contains(&clamped));
        prop_assert!(corrected.pre_steps.is_empty());
    }

    #[test]
    fn expansion_is_deterministic(
        count in 0u64..8,
        prompt in prop::sample::select(vec!["", "straight legs", "wide table"]),
        start_in_edit in any::<bool>(),
    ) {
        let registry = loop_registry(count);
        let pipeline = CallPipeline::default();
        let engine = ExpansionEngine::new(&registry, &pipeline);
        let scene = SceneContext::new(if start_in_edit { Mode::Edit } else { Mode::Object });

        let first = engine.expand("marker_row", &Map::new(), prompt, &scene);
        let second = engine.expand("marker_row", &Map::new(), prompt, &scene);
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn explicit_beats_modifier_beats_default(
        default in -50i64..50,
        modifier in 100i64..150,
        explicit in 200i64..250,
    ) {
        let definition = layered_definition(default, modifier);
        let mut audit = AuditTrail::new();
        let explicit_params = Map::from_iter([("width".to_string(), json!(explicit))]);

        let all_tiers = resolve_variables(
            &definition,
            &explicit_params,
            "a wide bench",
            ModifierMatchMode::Substring,
            &mut audit,
        );
        prop_assert_eq!(all_tiers.get("width"), Some(&json!(explicit)));

        let no_explicit = resolve_variables(
            &definition,
            &Map::new(),
            "a wide bench",
            ModifierMatchMode::Substring,
            &mut audit,
        );
        prop_assert_eq!(no_explicit.get("width"), Some(&json!(modifier)));

        let defaults_only = resolve_variables(
            &definition,
            &Map::new(),
            "a narrow bench",
            ModifierMatchMode::Substring,
            &mut audit,
        );
        prop_assert_eq!(defaults_only.get("width"), Some(&json!(default)));
    }

    #[test]
    fn loop_emits_min_of_count_and_cap(count in 0u64..40, cap in 1usize..16) {
        let registry = loop_registry(count);
        let pipeline = CallPipeline::default();
        let engine = ExpansionEngine::new(&registry, &pipeline).with_limits(ExpansionLimits {
            max_loop_iterations: cap,
            ..ExpansionLimits::default()
        });
        let plan = engine.expand("marker_row", &Map::new(), "", &SceneContext::new(Mode::Object));

        let expected = (count as usize).min(cap);
        prop_assert_eq!(plan.calls.len(), expected);
        for (index, corrected) in plan.calls.iter().enumerate() {
            prop_assert_eq!(corrected.call.param("index"), Some(&json!(index)));
        }
    }
}
