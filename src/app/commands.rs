use super::cli::{help_text, parse_cli_verb, split_global_options, CliVerb, GlobalOptions};
use crate::config::{load_settings, load_workflow_dir, RouterSettings};
use crate::model::{Plan, SceneContext, ToolCall};
use crate::router::RouterSupervisor;
use crate::shared::logging::append_decision_log;
use crate::workflow::WorkflowRegistry;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let (options, args) = split_global_options(args)?;
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Workflows => cmd_workflows(&args[1..]),
        CliVerb::Correct => cmd_correct(&options, &args[1..]),
        CliVerb::Expand => cmd_expand(&options, &args[1..]),
        CliVerb::Match => cmd_match(&options, &args[1..]),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}

fn cmd_workflows(args: &[String]) -> Result<String, String> {
    let [dir] = args else {
        return Err("usage: workflows <dir>".to_string());
    };
    let report = load_workflow_dir(Path::new(dir)).map_err(|err| err.to_string())?;
    let workflows = report
        .registry
        .iter()
        .map(|definition| {
            json!({
                "name": definition.name,
                "description": definition.description,
                "category": definition.category,
                "steps": definition.steps.len(),
                "parameters": definition
                    .parameters
                    .iter()
                    .map(|spec| json!({ "name": spec.name, "required": spec.required }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    let rejected = report
        .rejected
        .iter()
        .map(|(path, err)| json!({ "path": path.display().to_string(), "error": err.to_string() }))
        .collect::<Vec<_>>();
    render(&json!({ "workflows": workflows, "rejected": rejected }))
}

fn cmd_correct(options: &GlobalOptions, args: &[String]) -> Result<String, String> {
    let (scene_path, tool, params) = match args {
        [scene, tool] => (scene, tool, Value::Object(Map::new())),
        [scene, tool, params] => (
            scene,
            tool,
            serde_json::from_str::<Value>(params)
                .map_err(|err| format!("params must be a JSON object: {err}"))?,
        ),
        _ => return Err("usage: correct <scene.json> <tool> [params-json]".to_string()),
    };
    if !params.is_object() {
        return Err("params must be a JSON object".to_string());
    }
    let scene = read_scene(Path::new(scene_path))?;
    let router = build_router(options, WorkflowRegistry::new())?;
    let decision = router.process(&ToolCall::from_json(tool.as_str(), params), &scene);

    log_run(
        options,
        "correct",
        &[
            ("tool", Value::String(tool.clone())),
            ("route", Value::String(decision.route.as_str().to_string())),
        ],
        &decision.plan,
    )?;
    let mut output = serde_json::to_value(&decision).map_err(|err| err.to_string())?;
    attach_plan_summary(&mut output, &decision.plan);
    render(&output)
}

fn cmd_expand(options: &GlobalOptions, args: &[String]) -> Result<String, String> {
    let mut positional = Vec::new();
    let mut prompt = String::new();
    let mut explicit = Map::new();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--prompt" => {
                prompt = args
                    .get(index + 1)
                    .cloned()
                    .ok_or_else(|| "`--prompt` requires text".to_string())?;
                index += 2;
            }
            "--param" => {
                let raw = args
                    .get(index + 1)
                    .ok_or_else(|| "`--param` requires key=value".to_string())?;
                let (key, value) = parse_param(raw)?;
                explicit.insert(key, value);
                index += 2;
            }
            other => {
                positional.push(other.to_string());
                index += 1;
            }
        }
    }
    let [dir, workflow, scene_path] = positional.as_slice() else {
        return Err(
            "usage: expand <dir> <workflow> <scene.json> [--prompt TEXT] [--param k=v]..."
                .to_string(),
        );
    };

    let report = load_workflow_dir(Path::new(dir)).map_err(|err| err.to_string())?;
    let scene = read_scene(Path::new(scene_path))?;
    let router = build_router(options, report.registry)?;
    let plan = router.expand(workflow, &explicit, &prompt, &scene);

    log_run(
        options,
        "expand",
        &[
            ("workflow", Value::String(workflow.clone())),
            ("prompt", Value::String(prompt.clone())),
        ],
        &plan,
    )?;
    let mut output = serde_json::to_value(&plan).map_err(|err| err.to_string())?;
    attach_plan_summary(&mut output, &plan);
    render(&output)
}

fn cmd_match(options: &GlobalOptions, args: &[String]) -> Result<String, String> {
    if args.len() < 2 {
        return Err("usage: match <dir> <goal...>".to_string());
    }
    let goal = args[1..].join(" ");
    let report = load_workflow_dir(Path::new(&args[0])).map_err(|err| err.to_string())?;
    let router = build_router(options, report.registry)?;
    let matched = router.set_goal(&goal, None);

    if let Some(path) = &options.log {
        append_decision_log(
            path,
            "match",
            &[
                ("goal", Value::String(goal.clone())),
                ("status", Value::String(matched.status.as_str().to_string())),
                (
                    "workflow",
                    matched
                        .workflow_name
                        .as_ref()
                        .map(|name| Value::String(name.to_string()))
                        .unwrap_or(Value::Null),
                ),
                ("audit", Value::from(matched.notes.messages())),
            ],
        )
        .map_err(|err| format!("failed to write decision log {}: {err}", path.display()))?;
    }
    render(&serde_json::to_value(&matched).map_err(|err| err.to_string())?)
}

fn build_router(
    options: &GlobalOptions,
    registry: WorkflowRegistry,
) -> Result<RouterSupervisor, String> {
    let settings = match &options.settings {
        Some(path) => load_settings(path).map_err(|err| err.to_string())?,
        None => RouterSettings::default(),
    };
    RouterSupervisor::from_settings(settings, Arc::new(registry)).map_err(|err| err.to_string())
}

fn read_scene(path: &Path) -> Result<SceneContext, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read scene {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid scene {}: {err}", path.display()))
}

/// `key=value`; the value is read as JSON when it parses, otherwise as text.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("`{raw}` must look like key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("`{raw}` has an empty key"));
    }
    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn render(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("failed to encode output: {err}"))
}

fn attach_plan_summary(output: &mut Value, plan: &Plan) {
    if let Value::Object(map) = output {
        map.insert(
            "execution_order".to_string(),
            Value::from(
                plan.flatten()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            ),
        );
        map.insert("fingerprint".to_string(), Value::String(plan.fingerprint()));
    }
}

fn log_run(
    options: &GlobalOptions,
    event: &str,
    extra: &[(&str, Value)],
    plan: &Plan,
) -> Result<(), String> {
    let Some(path) = &options.log else {
        return Ok(());
    };
    let mut fields = extra.to_vec();
    fields.push(("calls", Value::from(plan.tool_names())));
    fields.push(("audit", Value::from(plan.audit.messages())));
    fields.push(("fingerprint", Value::String(plan.fingerprint())));
    append_decision_log(path, event, &fields)
        .map_err(|err| format!("failed to write decision log {}: {err}", path.display()))
}
