use super::rules::{CorrectionRules, ParamRange};
use crate::model::{AuditKind, AuditTrail, CorrectedToolCall, Mode, RequiredMode, SceneContext, ToolCall};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ClampOutcome {
    Unchanged,
    Clamped(Value),
    NotNumeric,
}

/// Mode, selection and parameter-range fix-ups for a single call. Tools
/// without any matching rule pass through untouched.
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    rules: CorrectionRules,
    ranges: BTreeMap<String, Vec<ParamRange>>,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self::new(CorrectionRules::blender_defaults())
    }
}

impl CorrectionEngine {
    pub fn new(rules: CorrectionRules) -> Self {
        let mut ranges = BTreeMap::<String, Vec<ParamRange>>::new();
        for range in &rules.param_ranges {
            ranges
                .entry(range.tool.clone())
                .or_default()
                .push(range.clone());
        }
        Self { rules, ranges }
    }

    pub fn rules(&self) -> &CorrectionRules {
        &self.rules
    }

    pub fn ranges_for(&self, tool: &str) -> &[ParamRange] {
        self.ranges.get(tool).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mode_switch_call(&self, mode: Mode) -> ToolCall {
        ToolCall::new(
            self.rules.mode_switch_tool.clone(),
            Map::from_iter([(
                self.rules.mode_param.clone(),
                Value::String(mode.as_str().to_string()),
            )]),
        )
    }

    pub fn select_all_call(&self) -> ToolCall {
        ToolCall::new(
            self.rules.select_tool.clone(),
            self.rules.select_all_params.clone(),
        )
    }

    pub fn correct(
        &self,
        tool_name: &str,
        params: &Map<String, Value>,
        context: &SceneContext,
        audit: &mut AuditTrail,
    ) -> CorrectedToolCall {
        let mut pre_steps = Vec::new();
        let mut reasons = Vec::new();

        if let Some(RequiredMode::Exactly(required)) = self.rules.required_mode(tool_name) {
            if context.mode != required {
                let reason = format!(
                    "`{tool_name}` requires {required} mode; switching from {}",
                    context.mode
                );
                debug!(tool = tool_name, from = %context.mode, to = %required, "mode switch");
                audit.push(AuditKind::ModeSwitch, reason.clone());
                reasons.push(reason);
                pre_steps.push(self.mode_switch_call(required));
            }
        }

        if self.rules.requires_selection(tool_name) && !context.has_selection() {
            let reason = format!("`{tool_name}` requires a selection; selecting all");
            debug!(tool = tool_name, "selection fix");
            audit.push(AuditKind::SelectionFix, reason.clone());
            reasons.push(reason);
            pre_steps.push(self.select_all_call());
        }

        let mut corrected = params.clone();
        for range in self.ranges_for(tool_name) {
            let Some(current) = corrected.get(&range.param) else {
                continue;
            };
            match clamp_value(current, range.min, range.max) {
                ClampOutcome::Unchanged => {}
                ClampOutcome::Clamped(clamped) => {
                    let reason = format!(
                        "`{tool_name}.{}` clamped from {} to {} (range {}..{})",
                        range.param, current, clamped, range.min, range.max
                    );
                    debug!(tool = tool_name, param = %range.param, "parameter clamped");
                    audit.push(AuditKind::Clamp, reason.clone());
                    reasons.push(reason);
                    corrected.insert(range.param.clone(), clamped);
                }
                ClampOutcome::NotNumeric => {
                    audit.push(
                        AuditKind::Clamp,
                        format!(
                            "`{tool_name}.{}` has a declared range but a non-numeric value; left unchanged",
                            range.param
                        ),
                    );
                }
            }
        }

        CorrectedToolCall {
            call: ToolCall::new(tool_name, corrected),
            pre_steps,
            reasons,
        }
    }

    pub fn correct_call(
        &self,
        call: &ToolCall,
        context: &SceneContext,
        audit: &mut AuditTrail,
    ) -> CorrectedToolCall {
        self.correct(call.name(), call.params(), context, audit)
    }
}

/// Integers stay integers when an integer fits inside the range; vectors are
/// clamped element-wise.
pub fn clamp_value(value: &Value, min: f64, max: f64) -> ClampOutcome {
    match value {
        Value::Number(number) => match clamp_number(number, min, max) {
            Some(clamped) => ClampOutcome::Clamped(Value::Number(clamped)),
            None => ClampOutcome::Unchanged,
        },
        Value::Array(items) => {
            let mut changed = false;
            let mut numeric = false;
            let clamped = items
                .iter()
                .map(|item| match item {
                    Value::Number(number) => {
                        numeric = true;
                        match clamp_number(number, min, max) {
                            Some(clamped) => {
                                changed = true;
                                Value::Number(clamped)
                            }
                            None => item.clone(),
                        }
                    }
                    other => other.clone(),
                })
                .collect::<Vec<_>>();
            if changed {
                ClampOutcome::Clamped(Value::Array(clamped))
            } else if numeric || items.is_empty() {
                ClampOutcome::Unchanged
            } else {
                ClampOutcome::NotNumeric
            }
        }
        _ => ClampOutcome::NotNumeric,
    }
}

fn clamp_number(number: &Number, min: f64, max: f64) -> Option<Number> {
    let raw = number.as_f64()?;
    if raw >= min && raw <= max {
        return None;
    }
    let clamped = raw.clamp(min, max);
    let is_integer = number.is_i64() || number.is_u64();
    if is_integer
        && clamped.fract() == 0.0
        && clamped >= i64::MIN as f64
        && clamped <= i64::MAX as f64
    {
        return Some(Number::from(clamped as i64));
    }
    Number::from_f64(clamped)
}
