use super::similarity::{SimilarityScorer, WorkflowCandidate};
use crate::model::{AuditKind, AuditTrail, RouterStatus};
use crate::shared::ids::WorkflowName;
use crate::workflow::{resolve_variables, ModifierMatchMode, WorkflowDefinition, WorkflowRegistry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingParam {
    pub name: String,
    pub description: Option<String>,
    pub options: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentMatch {
    pub status: RouterStatus,
    pub workflow_name: Option<WorkflowName>,
    pub score: f32,
    pub resolved_params: Map<String, Value>,
    pub missing_params: Vec<MissingParam>,
    pub notes: AuditTrail,
}

impl IntentMatch {
    pub fn no_match(notes: AuditTrail) -> Self {
        Self::with_status(RouterStatus::NoMatch, notes)
    }

    pub fn disabled() -> Self {
        let mut notes = AuditTrail::new();
        notes.push(AuditKind::Passthrough, "router is disabled");
        Self::with_status(RouterStatus::Disabled, notes)
    }

    fn with_status(status: RouterStatus, notes: AuditTrail) -> Self {
        Self {
            status,
            workflow_name: None,
            score: 0.0,
            resolved_params: Map::new(),
            missing_params: Vec::new(),
            notes,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == RouterStatus::Ready
    }
}

/// Maps free text to a workflow. Scoring is delegated; thresholding,
/// tie-breaking and parameter resolution happen here.
#[derive(Clone)]
pub struct IntentMatcher {
    registry: Arc<WorkflowRegistry>,
    scorer: Arc<dyn SimilarityScorer>,
    threshold: f32,
    modifier_mode: ModifierMatchMode,
}

impl std::fmt::Debug for IntentMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentMatcher")
            .field("workflows", &self.registry.len())
            .field("threshold", &self.threshold)
            .field("modifier_mode", &self.modifier_mode)
            .finish_non_exhaustive()
    }
}

impl IntentMatcher {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        scorer: Arc<dyn SimilarityScorer>,
        threshold: f32,
    ) -> Self {
        Self {
            registry,
            scorer,
            threshold,
            modifier_mode: ModifierMatchMode::default(),
        }
    }

    pub fn with_modifier_mode(mut self, mode: ModifierMatchMode) -> Self {
        self.modifier_mode = mode;
        self
    }

    /// A goal equal to a registered workflow name scores 1.0 without
    /// consulting the scorer.
    pub fn match_goal(&self, goal: &str, explicit: &Map<String, Value>) -> IntentMatch {
        let mut notes = AuditTrail::new();
        let trimmed = goal.trim();
        if trimmed.is_empty() {
            notes.push(AuditKind::Goal, "goal text is empty");
            return IntentMatch::no_match(notes);
        }

        if let Some(definition) = self.registry.get(trimmed) {
            notes.push(
                AuditKind::Goal,
                format!("goal names workflow `{}` directly", definition.name),
            );
            return self.resolve(definition, 1.0, goal, explicit, notes);
        }

        let candidates = self
            .registry
            .iter()
            .map(|definition| WorkflowCandidate {
                name: definition.name.as_str().to_string(),
                phrases: definition.match_phrases(),
            })
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            notes.push(AuditKind::Goal, "no workflows are registered");
            return IntentMatch::no_match(notes);
        }

        let ranking = match self.scorer.rank(trimmed, &candidates) {
            Ok(ranking) => ranking,
            Err(err) => {
                warn!(error = %err, "similarity scoring failed; falling back to no_match");
                notes.push(
                    AuditKind::CollaboratorTimeout,
                    format!("{err}; falling back to no_match"),
                );
                return IntentMatch::no_match(notes);
            }
        };
        let scores = ranking
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .collect::<HashMap<_, _>>();

        let mut best: Option<(&WorkflowDefinition, f32)> = None;
        for definition in self.registry.iter() {
            let score = scores
                .get(definition.name.as_str())
                .copied()
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            if best.map(|(_, current)| score > current).unwrap_or(true) {
                best = Some((definition, score));
            }
        }
        let Some((definition, score)) = best else {
            return IntentMatch::no_match(notes);
        };

        if score < self.threshold {
            debug!(workflow = %definition.name, score, "best candidate below threshold");
            notes.push(
                AuditKind::Goal,
                format!(
                    "best candidate `{}` scored {score:.2}, below threshold {:.2}",
                    definition.name, self.threshold
                ),
            );
            let mut result = IntentMatch::no_match(notes);
            result.score = score;
            return result;
        }

        notes.push(
            AuditKind::Goal,
            format!("goal matched workflow `{}` with score {score:.2}", definition.name),
        );
        self.resolve(definition, score, goal, explicit, notes)
    }

    fn resolve(
        &self,
        definition: &WorkflowDefinition,
        score: f32,
        goal: &str,
        explicit: &Map<String, Value>,
        mut notes: AuditTrail,
    ) -> IntentMatch {
        let resolved = resolve_variables(definition, explicit, goal, self.modifier_mode, &mut notes);
        let missing_params = definition
            .required_parameters()
            .filter(|spec| resolved.get(&spec.name).map(Value::is_null).unwrap_or(true))
            .map(|spec| MissingParam {
                name: spec.name.clone(),
                description: spec.description.clone(),
                options: spec.options.clone(),
            })
            .collect::<Vec<_>>();

        let status = if missing_params.is_empty() {
            RouterStatus::Ready
        } else {
            notes.push(
                AuditKind::Goal,
                format!(
                    "workflow `{}` needs input for [{}]",
                    definition.name,
                    missing_params
                        .iter()
                        .map(|param| param.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
            RouterStatus::NeedsInput
        };

        IntentMatch {
            status,
            workflow_name: Some(definition.name.clone()),
            score,
            resolved_params: resolved,
            missing_params,
            notes,
        }
    }
}
