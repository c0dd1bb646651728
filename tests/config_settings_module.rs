use router_supervisor::config::{load_settings, ConfigError, RouterSettings};
use router_supervisor::model::{Mode, RequiredMode};
use router_supervisor::workflow::ModifierMatchMode;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const SETTINGS: &str = r#"
enabled: true
intent:
  match_threshold: 0.6
  scorer_timeout_ms: 250
expansion:
  max_loop_iterations: 16
  max_calls: 128
  max_includes: 12
pattern:
  min_confidence: 0.65
modifiers:
  match_mode: word_boundary
correction:
  tool_modes:
    mesh_knife_project: OBJECT
  param_ranges:
    - tool: mesh_bevel
      param: offset
      min: 0.01
      max: 1.0
overrides:
  - id: groove_edge
    trigger_tool: mesh_extrude_region
    trigger_pattern: groove_like
    replacements:
      - tool: mesh_extrude_region
        inherit: [move]
      - tool: mesh_bevel
        params:
          offset: 0.01
"#;

#[test]
fn config_settings_module_defaults_are_usable() {
    let settings = RouterSettings::default();
    settings.validate().expect("defaults validate");
    assert!(settings.enabled);
    assert_eq!(settings.intent.match_threshold, 0.45);
    assert_eq!(settings.scorer_timeout(), Duration::from_millis(2000));
    assert_eq!(settings.expansion.max_include_depth, 4);
    assert_eq!(settings.expansion.max_includes, 64);
    assert_eq!(settings.modifiers.match_mode, ModifierMatchMode::Substring);

    let empty = RouterSettings::from_yaml_str("{}", "inline").expect("empty document");
    assert_eq!(empty, settings);
}

#[test]
fn config_settings_module_parses_every_section() {
    let settings = RouterSettings::from_yaml_str(SETTINGS, "inline").expect("settings");
    settings.validate().expect("valid");

    assert_eq!(settings.intent.match_threshold, 0.6);
    assert_eq!(settings.scorer_timeout(), Duration::from_millis(250));
    assert_eq!(settings.expansion.max_loop_iterations, 16);
    assert_eq!(settings.expansion.max_include_depth, 4);
    assert_eq!(settings.expansion.max_includes, 12);
    assert_eq!(settings.pattern.min_confidence, 0.65);
    assert_eq!(settings.modifiers.match_mode, ModifierMatchMode::WordBoundary);
    assert_eq!(
        settings.correction.required_mode("mesh_knife_project"),
        Some(RequiredMode::Exactly(Mode::Object))
    );
    assert_eq!(settings.correction.mode_switch_tool, "system_set_mode");
    assert_eq!(settings.overrides.len(), 1);
    assert_eq!(settings.overrides[0].confidence_threshold, 0.5);
    assert_eq!(settings.overrides[0].replacements[0].inherit, vec!["move".to_string()]);
}

#[test]
fn config_settings_module_builds_pipeline_with_configured_rules() {
    let settings = RouterSettings::from_yaml_str(SETTINGS, "inline").expect("settings");
    let pipeline = settings.build_pipeline().expect("pipeline");
    let ids = pipeline
        .overrides()
        .rules()
        .iter()
        .map(|rule| rule.id.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["phone_screen_inset", "tower_segmented_extrude", "groove_edge"]
    );
    assert_eq!(pipeline.detector().min_confidence(), 0.65);
    assert_eq!(pipeline.correction().ranges_for("mesh_bevel").len(), 1);

    let replaced = RouterSettings {
        replace_builtin_overrides: true,
        ..settings
    };
    let pipeline = replaced.build_pipeline().expect("pipeline");
    assert_eq!(pipeline.overrides().rules().len(), 1);
}

#[test]
fn config_settings_module_rejects_out_of_range_values() {
    let cases = [
        ("intent:\n  match_threshold: 1.2\n", "match_threshold"),
        ("intent:\n  scorer_timeout_ms: 0\n", "scorer_timeout_ms"),
        ("pattern:\n  min_confidence: -0.1\n", "min_confidence"),
        ("expansion:\n  max_calls: 0\n", "max_calls"),
        (
            "correction:\n  param_ranges:\n    - { tool: mesh_bevel, param: offset, min: 2.0, max: 1.0 }\n",
            "correction",
        ),
        (
            "overrides:\n  - id: empty_rule\n    trigger_tool: mesh_inset\n    replacements: []\n",
            "no replacements",
        ),
    ];
    for (yaml, needle) in cases {
        let settings = RouterSettings::from_yaml_str(yaml, "inline").expect("parses");
        let err = settings.validate().expect_err("invalid");
        assert!(
            err.to_string().contains(needle),
            "expected `{needle}` in `{err}`"
        );
    }
}

#[test]
fn config_settings_module_rejects_unknown_enum_spellings() {
    let err = RouterSettings::from_yaml_str("modifiers:\n  match_mode: fuzzy\n", "inline")
        .expect_err("bad mode");
    assert!(matches!(err, ConfigError::Parse { .. }));

    let err = RouterSettings::from_yaml_str(
        "correction:\n  tool_modes:\n    mesh_inset: UPSIDE_DOWN\n",
        "inline",
    )
    .expect_err("bad required mode");
    assert!(err.to_string().contains("mode"));
}

#[test]
fn config_settings_module_load_settings_reads_and_validates_file() {
    let temp = tempdir().expect("tempdir");
    let good = temp.path().join("router.yaml");
    fs::write(&good, SETTINGS).expect("write settings");
    let settings = load_settings(&good).expect("load");
    assert_eq!(settings.intent.scorer_timeout_ms, 250);

    let bad = temp.path().join("bad.yaml");
    fs::write(&bad, "intent:\n  match_threshold: 7\n").expect("write bad");
    assert!(matches!(load_settings(&bad), Err(ConfigError::Settings(_))));

    let missing = temp.path().join("absent.yaml");
    assert!(matches!(load_settings(&missing), Err(ConfigError::Read { .. })));
}
