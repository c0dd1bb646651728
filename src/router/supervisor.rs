use super::goal::{CurrentGoal, Route, RouterDecision};
use crate::config::{ConfigError, RouterSettings};
use crate::intent::{BoundedScorer, IntentMatch, IntentMatcher, LexicalScorer, SimilarityScorer};
use crate::model::{AuditKind, AuditTrail, CorrectedToolCall, Plan, RouterStatus, SceneContext, ToolCall};
use crate::overrides::{OverrideError, OverrideRule};
use crate::pipeline::CallPipeline;
use crate::workflow::{ExpansionEngine, WorkflowRegistry};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Orchestrates correction, detection, override, intent matching and
/// expansion. The current goal is the only state shared between requests;
/// the override table changes only through `&mut self`.
#[derive(Debug)]
pub struct RouterSupervisor {
    settings: RouterSettings,
    pipeline: CallPipeline,
    registry: Arc<WorkflowRegistry>,
    matcher: IntentMatcher,
    goal: Mutex<Option<CurrentGoal>>,
}

impl RouterSupervisor {
    /// Uses the built-in lexical scorer, bounded by the configured timeout.
    pub fn from_settings(
        settings: RouterSettings,
        registry: Arc<WorkflowRegistry>,
    ) -> Result<Self, ConfigError> {
        Self::with_scorer(settings, registry, Arc::new(LexicalScorer))
    }

    pub fn with_scorer(
        settings: RouterSettings,
        registry: Arc<WorkflowRegistry>,
        scorer: Arc<dyn SimilarityScorer>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let pipeline = settings.build_pipeline()?;
        let bounded = BoundedScorer::new(scorer, settings.scorer_timeout());
        let matcher = IntentMatcher::new(
            Arc::clone(&registry),
            Arc::new(bounded),
            settings.intent.match_threshold,
        )
        .with_modifier_mode(settings.modifiers.match_mode);
        Ok(Self {
            settings,
            pipeline,
            registry,
            matcher,
            goal: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &CallPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    fn goal_slot(&self) -> MutexGuard<'_, Option<CurrentGoal>> {
        self.goal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_goal(&self) -> Option<CurrentGoal> {
        self.goal_slot().clone()
    }

    /// Replaces the stored goal unconditionally and reports how it matches.
    pub fn set_goal(&self, goal_text: &str, resolved_params: Option<Map<String, Value>>) -> IntentMatch {
        let goal = CurrentGoal::new(goal_text, resolved_params.unwrap_or_default());
        *self.goal_slot() = Some(goal.clone());
        let status = self.evaluate(&goal);
        info!(goal = goal_text, status = %status.status, "goal set");
        status
    }

    pub fn get_status(&self) -> IntentMatch {
        match self.current_goal() {
            Some(goal) => self.evaluate(&goal),
            None if !self.settings.enabled => IntentMatch::disabled(),
            None => {
                let mut notes = AuditTrail::new();
                notes.push(AuditKind::Goal, "no goal is set");
                IntentMatch::no_match(notes)
            }
        }
    }

    pub fn clear_goal(&self) -> Option<CurrentGoal> {
        let previous = self.goal_slot().take();
        if previous.is_some() {
            info!("goal cleared");
        }
        previous
    }

    fn evaluate(&self, goal: &CurrentGoal) -> IntentMatch {
        if !self.settings.enabled {
            return IntentMatch::disabled();
        }
        self.matcher
            .match_goal(&goal.goal_text, &goal.resolved_params)
    }

    pub fn process(&self, call: &ToolCall, context: &SceneContext) -> RouterDecision {
        self.process_with_history(call, context, &[])
    }

    pub fn process_with_history(
        &self,
        call: &ToolCall,
        context: &SceneContext,
        history: &[ToolCall],
    ) -> RouterDecision {
        if !self.settings.enabled {
            let mut audit = AuditTrail::new();
            audit.push(
                AuditKind::Passthrough,
                format!("router is disabled; `{}` passed through unchanged", call.name()),
            );
            return RouterDecision {
                route: Route::Passthrough,
                status: RouterStatus::Disabled,
                plan: Plan::new(vec![CorrectedToolCall::passthrough(call.clone())], audit),
                pattern: None,
            };
        }

        let mut audit = AuditTrail::new();
        let status = match self.current_goal() {
            Some(goal) => {
                let matched = self.evaluate(&goal);
                match (&matched.workflow_name, matched.status) {
                    (Some(name), RouterStatus::Ready) => {
                        audit.push(
                            AuditKind::Goal,
                            format!(
                                "`{}` received while goal `{}` is ready; planning workflow `{name}`",
                                call.name(),
                                goal.goal_text
                            ),
                        );
                        audit.append(matched.notes.clone());
                        let expansion = self.expansion_engine().expand(
                            name.as_str(),
                            &goal.resolved_params,
                            &goal.goal_text,
                            context,
                        );
                        audit.append(expansion.audit);
                        debug!(workflow = %name, calls = expansion.calls.len(), "workflow route");
                        return RouterDecision {
                            route: Route::Workflow { name: name.clone() },
                            status: RouterStatus::Ready,
                            plan: Plan::new(expansion.calls, audit),
                            pattern: None,
                        };
                    }
                    _ => {
                        audit.push(
                            AuditKind::Goal,
                            format!(
                                "goal `{}` is {}; routing `{}` manually",
                                goal.goal_text,
                                matched.status,
                                call.name()
                            ),
                        );
                        matched.status
                    }
                }
            }
            None => RouterStatus::NoMatch,
        };

        let supervised = self.pipeline.plan_single(call, context, history, &mut audit);
        RouterDecision {
            route: Route::Manual,
            status,
            plan: Plan::new(supervised.calls, audit),
            pattern: supervised.pattern,
        }
    }

    pub fn expansion_engine(&self) -> ExpansionEngine<'_> {
        ExpansionEngine::new(&self.registry, &self.pipeline)
            .with_limits(self.settings.expansion)
            .with_modifier_mode(self.settings.modifiers.match_mode)
    }

    /// Direct expansion, independent of the stored goal.
    pub fn expand(
        &self,
        workflow_name: &str,
        explicit: &Map<String, Value>,
        prompt: &str,
        context: &SceneContext,
    ) -> Plan {
        self.expansion_engine()
            .expand(workflow_name, explicit, prompt, context)
    }

    pub fn register_rule(&mut self, rule: OverrideRule) -> Result<(), OverrideError> {
        self.pipeline.overrides_mut().register_rule(rule)
    }

    pub fn remove_rule(&mut self, id: &str) -> Option<OverrideRule> {
        self.pipeline.overrides_mut().remove_rule(id)
    }
}
