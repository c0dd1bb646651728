use super::definition::{LoopSource, StepAction, WorkflowDefinition, WorkflowStep};
use super::registry::WorkflowRegistry;
use super::variables::{resolve_variables, ModifierMatchMode};
use crate::expr::{evaluate, evaluate_condition, interpolate_audited, Scope};
use crate::model::{AuditKind, AuditTrail, CorrectedToolCall, Plan, SceneContext, ToolCall};
use crate::pipeline::CallPipeline;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

fn default_max_loop_iterations() -> usize {
    64
}

fn default_max_calls() -> usize {
    512
}

fn default_max_include_depth() -> usize {
    4
}

fn default_max_includes() -> usize {
    64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExpansionLimits {
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: usize,
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
    #[serde(default = "default_max_includes")]
    pub max_includes: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_loop_iterations: default_max_loop_iterations(),
            max_calls: default_max_calls(),
            max_include_depth: default_max_include_depth(),
            max_includes: default_max_includes(),
        }
    }
}

impl ExpansionLimits {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_loop_iterations == 0 {
            return Err("`expansion.max_loop_iterations` must be >= 1".to_string());
        }
        if self.max_calls == 0 {
            return Err("`expansion.max_calls` must be >= 1".to_string());
        }
        Ok(())
    }
}

struct Run {
    view: SceneContext,
    calls: Vec<CorrectedToolCall>,
    history: Vec<ToolCall>,
    audit: AuditTrail,
    limit_hit: bool,
    includes: usize,
    include_limit_hit: bool,
}

/// Turns a workflow into a corrected plan. Expansion is a pure function of
/// its arguments; the scene is only read, and effects of generated calls are
/// tracked on a private copy.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionEngine<'a> {
    registry: &'a WorkflowRegistry,
    pipeline: &'a CallPipeline,
    limits: ExpansionLimits,
    modifier_mode: ModifierMatchMode,
}

impl<'a> ExpansionEngine<'a> {
    pub fn new(registry: &'a WorkflowRegistry, pipeline: &'a CallPipeline) -> Self {
        Self {
            registry,
            pipeline,
            limits: ExpansionLimits::default(),
            modifier_mode: ModifierMatchMode::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_modifier_mode(mut self, mode: ModifierMatchMode) -> Self {
        self.modifier_mode = mode;
        self
    }

    pub fn limits(&self) -> ExpansionLimits {
        self.limits
    }

    pub fn expand(
        &self,
        workflow_name: &str,
        explicit: &Map<String, Value>,
        prompt: &str,
        context: &SceneContext,
    ) -> Plan {
        let mut run = Run {
            view: context.clone(),
            calls: Vec::new(),
            history: Vec::new(),
            audit: AuditTrail::new(),
            limit_hit: false,
            includes: 0,
            include_limit_hit: false,
        };

        match self.registry.get(workflow_name) {
            Some(definition) => self.expand_workflow(definition, explicit, prompt, 0, &mut run),
            None => {
                debug!(workflow = workflow_name, "expansion requested for unknown workflow");
                run.audit.push(
                    AuditKind::RuntimeSkip,
                    format!("workflow `{workflow_name}` is not registered; nothing to expand"),
                );
            }
        }

        Plan::new(run.calls, run.audit)
    }

    fn expand_workflow(
        &self,
        definition: &WorkflowDefinition,
        explicit: &Map<String, Value>,
        prompt: &str,
        depth: usize,
        run: &mut Run,
    ) {
        let env = resolve_variables(definition, explicit, prompt, self.modifier_mode, &mut run.audit);

        for (index, step) in definition.steps.iter().enumerate() {
            if run.limit_hit {
                return;
            }
            let label = format!("`{}` step {} ({})", definition.name, index + 1, step.action.label());

            let Some(loop_spec) = &step.loop_spec else {
                if self.condition_holds(step, &env, &label, run) {
                    self.expand_instance(step, &env, &label, prompt, depth, run);
                }
                continue;
            };

            let Some(items) = self.loop_items(&loop_spec.source, &env, &label, run) else {
                continue;
            };
            run.audit.push(
                AuditKind::LoopUnroll,
                format!(
                    "{label} unrolled into {} instance(s) of `{}`",
                    items.len(),
                    loop_spec.var_name
                ),
            );
            for item in items {
                if run.limit_hit {
                    return;
                }
                let instance = format!("{label} [{}={item}]", loop_spec.var_name);
                let mut local = env.clone();
                local.insert(loop_spec.var_name.clone(), item);
                if self.condition_holds(step, &local, &instance, run) {
                    self.expand_instance(step, &local, &instance, prompt, depth, run);
                }
            }
        }
    }

    /// Evaluated per instance against the simulated view, so a condition
    /// sees the loop variable and the effects of every call planned so far.
    fn condition_holds(
        &self,
        step: &WorkflowStep,
        env: &Map<String, Value>,
        label: &str,
        run: &mut Run,
    ) -> bool {
        let Some(condition) = &step.condition else {
            return true;
        };
        let scope = Scope::new(env, &run.view);
        match evaluate_condition(condition, &scope) {
            Ok(true) => true,
            Ok(false) => {
                debug!(step = %label, "condition false; step skipped");
                run.audit.push(
                    AuditKind::RuntimeSkip,
                    format!("{label} skipped: condition `{}` is false", condition.source_text()),
                );
                false
            }
            Err(reason) => {
                run.audit.push(
                    AuditKind::UnresolvedReference,
                    format!(
                        "{label} condition `{}` could not be evaluated: {reason}",
                        condition.source_text()
                    ),
                );
                run.audit.push(
                    AuditKind::RuntimeSkip,
                    format!("{label} skipped: condition is unresolved"),
                );
                false
            }
        }
    }

    /// Loop values resolved once before unrolling, capped at
    /// `max_loop_iterations`. `None` means the step is skipped.
    fn loop_items(
        &self,
        source: &LoopSource,
        env: &Map<String, Value>,
        label: &str,
        run: &mut Run,
    ) -> Option<Vec<Value>> {
        let max = self.limits.max_loop_iterations;
        let scope = Scope::new(env, &run.view);
        let mut items = match source {
            LoopSource::Count(expr) => {
                let resolved = evaluate(expr, &scope, &mut run.audit);
                let count = match resolved.as_f64() {
                    Some(count) if count.is_finite() && count >= 0.0 => count.floor(),
                    _ => {
                        run.audit.push(
                            AuditKind::RuntimeSkip,
                            format!("{label} skipped: loop count {resolved} is not a non-negative number"),
                        );
                        return None;
                    }
                };
                let capped = if count > max as f64 { max + 1 } else { count as usize };
                (0..capped).map(Value::from).collect::<Vec<_>>()
            }
            LoopSource::Values(values) => values
                .iter()
                .map(|value| evaluate(value, &scope, &mut run.audit))
                .collect::<Vec<_>>(),
        };
        if items.len() > max {
            run.audit.push(
                AuditKind::LimitReached,
                format!("{label} loop truncated to max_loop_iterations ({max})"),
            );
            items.truncate(max);
        }
        Some(items)
    }

    fn expand_instance(
        &self,
        step: &WorkflowStep,
        env: &Map<String, Value>,
        label: &str,
        prompt: &str,
        depth: usize,
        run: &mut Run,
    ) {
        let scope = Scope::new(env, &run.view);
        let mut params = Map::new();
        for (key, expr) in &step.params {
            let value = evaluate(expr, &scope, &mut run.audit);
            params.insert(key.clone(), value);
        }

        match &step.action {
            StepAction::Tool(tool) => {
                if run.calls.len() >= self.limits.max_calls {
                    self.note_call_limit(run);
                    return;
                }
                let tool = interpolate_audited(tool, env, &mut run.audit);
                let call = ToolCall::new(tool, params);
                let supervised = self
                    .pipeline
                    .supervise(&call, &mut run.view, &run.history, &mut run.audit);
                run.history.push(call);
                // An override's replacement sequence is emitted whole or not at all.
                if run.calls.len() + supervised.calls.len() > self.limits.max_calls {
                    self.note_call_limit(run);
                    return;
                }
                run.calls.extend(supervised.calls);
            }
            StepAction::Include(name) => {
                let next_depth = depth + 1;
                if next_depth > self.limits.max_include_depth {
                    run.audit.push(
                        AuditKind::LimitReached,
                        format!(
                            "{label} include of `{name}` skipped: depth {next_depth} exceeds max_include_depth ({})",
                            self.limits.max_include_depth
                        ),
                    );
                    return;
                }
                if run.includes >= self.limits.max_includes {
                    if !run.include_limit_hit {
                        run.include_limit_hit = true;
                        run.audit.push(
                            AuditKind::LimitReached,
                            format!(
                                "{label} include of `{name}` skipped: plan reached max_includes ({}); later includes are skipped",
                                self.limits.max_includes
                            ),
                        );
                    }
                    return;
                }
                let Some(child) = self.registry.get(name.as_str()) else {
                    run.audit.push(
                        AuditKind::RuntimeSkip,
                        format!("{label} skipped: included workflow `{name}` is not registered"),
                    );
                    return;
                };
                run.includes += 1;
                run.audit.push(
                    AuditKind::Include,
                    format!("{label} expands `{name}` inline (depth {next_depth})"),
                );
                self.expand_workflow(child, &params, prompt, next_depth, run);
            }
        }
    }

    fn note_call_limit(&self, run: &mut Run) {
        if run.limit_hit {
            return;
        }
        run.limit_hit = true;
        run.audit.push(
            AuditKind::LimitReached,
            format!(
                "plan reached max_calls ({}); remaining steps skipped",
                self.limits.max_calls
            ),
        );
    }
}
