use super::rules::{builtin_rules, OverrideRule};
use crate::model::{AuditEntry, AuditKind, DetectedPattern, SceneContext, ToolCall};
use crate::shared::ids::RuleId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("override rule `{0}` is already registered")]
    DuplicateRule(String),
    #[error("override rule validation failed: {0}")]
    InvalidRule(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverrideDecision {
    pub should_override: bool,
    pub replacements: Vec<ToolCall>,
    pub applied_rule: Option<RuleId>,
    pub notes: Vec<AuditEntry>,
}

impl OverrideDecision {
    pub fn reasons(&self) -> Vec<String> {
        self.notes.iter().map(|note| note.message.clone()).collect()
    }

    /// The calls to run: replacements when overriding, otherwise the original.
    pub fn calls_for(&self, original: &ToolCall) -> Vec<ToolCall> {
        if self.should_override {
            self.replacements.clone()
        } else {
            vec![original.clone()]
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverrideEngine {
    rules: Vec<OverrideRule>,
    by_tool: BTreeMap<String, Vec<usize>>,
}

impl OverrideEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut engine = Self::new();
        for rule in builtin_rules() {
            let id = rule.id.to_string();
            if let Err(err) = engine.register_rule(rule) {
                debug_assert!(false, "builtin override rule `{id}` rejected: {err}");
                warn!(rule = %id, error = %err, "builtin override rule skipped");
            }
        }
        engine
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn register_rule(&mut self, rule: OverrideRule) -> Result<(), OverrideError> {
        rule.validate().map_err(OverrideError::InvalidRule)?;
        if self.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(OverrideError::DuplicateRule(rule.id.to_string()));
        }
        self.by_tool
            .entry(rule.trigger_tool.clone())
            .or_default()
            .push(self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Removal keeps the relative order of the remaining rules.
    pub fn remove_rule(&mut self, id: &str) -> Option<OverrideRule> {
        let position = self.rules.iter().position(|rule| rule.id.as_str() == id)?;
        let removed = self.rules.remove(position);
        self.reindex();
        Some(removed)
    }

    fn reindex(&mut self) {
        self.by_tool.clear();
        for (index, rule) in self.rules.iter().enumerate() {
            self.by_tool
                .entry(rule.trigger_tool.clone())
                .or_default()
                .push(index);
        }
    }

    pub fn check_override(
        &self,
        tool_name: &str,
        params: &Map<String, Value>,
        _context: &SceneContext,
        pattern: Option<&DetectedPattern>,
    ) -> OverrideDecision {
        let Some(candidates) = self.by_tool.get(tool_name) else {
            return OverrideDecision::default();
        };

        let mut decision = OverrideDecision::default();
        for index in candidates {
            let rule = &self.rules[*index];
            match rule_matches(rule, pattern) {
                Ok(()) => match decision.applied_rule.clone() {
                    None => {
                        decision.should_override = true;
                        decision.replacements = rule
                            .replacements
                            .iter()
                            .map(|spec| spec.build(params))
                            .collect();
                        decision.applied_rule = Some(rule.id.clone());
                        debug!(tool = tool_name, rule = %rule.id, "override applied");
                        decision.notes.push(AuditEntry::new(
                            AuditKind::Override,
                            format!(
                                "`{tool_name}` replaced by [{}] via rule `{}`",
                                rule.replacements
                                    .iter()
                                    .map(|spec| spec.tool.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", "),
                                rule.id
                            ),
                        ));
                    }
                    Some(applied) => {
                        decision.notes.push(AuditEntry::new(
                            AuditKind::OverrideConflict,
                            format!(
                                "rule `{}` also matched `{tool_name}` but was ignored; `{applied}` was registered first",
                                rule.id
                            ),
                        ));
                    }
                },
                Err(reason) => {
                    decision.notes.push(AuditEntry::new(
                        AuditKind::RuntimeSkip,
                        format!("rule `{}` not applied to `{tool_name}`: {reason}", rule.id),
                    ));
                }
            }
        }
        decision
    }
}

fn rule_matches(rule: &OverrideRule, pattern: Option<&DetectedPattern>) -> Result<(), String> {
    let Some(required) = rule.trigger_pattern.as_deref() else {
        return Ok(());
    };
    let Some(pattern) = pattern else {
        return Err(format!("pattern `{required}` not detected"));
    };
    if pattern.pattern_type != required {
        return Err(format!(
            "detected pattern `{}` is not `{required}`",
            pattern.pattern_type
        ));
    }
    if pattern.confidence < rule.confidence_threshold {
        return Err(format!(
            "pattern `{required}` confidence {:.2} below threshold {:.2}",
            pattern.confidence, rule.confidence_threshold
        ));
    }
    Ok(())
}
