use crate::correction::CorrectionEngine;
use crate::model::{AuditTrail, CorrectedToolCall, DetectedPattern, SceneContext, ToolCall};
use crate::overrides::OverrideEngine;
use crate::pattern::PatternDetector;
use crate::shared::ids::RuleId;
use crate::simulation::EffectModel;

/// Outcome of running one requested call through the safety net.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisedCall {
    pub calls: Vec<CorrectedToolCall>,
    pub pattern: Option<DetectedPattern>,
    pub applied_rule: Option<RuleId>,
}

/// Correction, pattern detection and override, in that order. Shared by the
/// manual route and by every call a workflow expansion emits.
#[derive(Debug)]
pub struct CallPipeline {
    correction: CorrectionEngine,
    detector: PatternDetector,
    overrides: OverrideEngine,
    effects: EffectModel,
}

impl Default for CallPipeline {
    fn default() -> Self {
        Self::new(
            CorrectionEngine::default(),
            PatternDetector::default(),
            OverrideEngine::with_builtin(),
        )
    }
}

impl CallPipeline {
    pub fn new(
        correction: CorrectionEngine,
        detector: PatternDetector,
        overrides: OverrideEngine,
    ) -> Self {
        let effects = EffectModel::from_rules(correction.rules());
        Self {
            correction,
            detector,
            overrides,
            effects,
        }
    }

    pub fn correction(&self) -> &CorrectionEngine {
        &self.correction
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn overrides(&self) -> &OverrideEngine {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut OverrideEngine {
        &mut self.overrides
    }

    /// Plans `call` against `view` and advances `view` past every emitted
    /// call, so consecutive calls never repeat a mode switch or selection fix.
    ///
    /// Override replacements are corrected again against the view left by
    /// the original call's pre-steps; those pre-steps run ahead of the first
    /// replacement.
    pub fn supervise(
        &self,
        call: &ToolCall,
        view: &mut SceneContext,
        history: &[ToolCall],
        audit: &mut AuditTrail,
    ) -> SupervisedCall {
        let corrected = self.correction.correct_call(call, view, audit);
        let pattern = self.detector.detect(view, history);
        let decision = self.overrides.check_override(
            corrected.call.name(),
            call.params(),
            view,
            pattern.as_ref(),
        );
        for note in &decision.notes {
            audit.record(note.clone());
        }

        if !decision.should_override {
            self.effects.apply_all(corrected.execution_order(), view);
            return SupervisedCall {
                calls: vec![corrected],
                pattern,
                applied_rule: None,
            };
        }

        self.effects.apply_all(&corrected.pre_steps, view);
        let mut leading = corrected.pre_steps;
        let mut leading_reasons = corrected.reasons;
        let mut calls = Vec::with_capacity(decision.replacements.len());
        for (index, replacement) in decision.replacements.iter().enumerate() {
            let mut planned = self.correction.correct_call(replacement, view, audit);
            if index == 0 {
                leading.append(&mut planned.pre_steps);
                planned.pre_steps = std::mem::take(&mut leading);
                leading_reasons.append(&mut planned.reasons);
                planned.reasons = std::mem::take(&mut leading_reasons);
            }
            self.effects.apply_all(planned.execution_order(), view);
            calls.push(planned);
        }

        SupervisedCall {
            calls,
            pattern,
            applied_rule: decision.applied_rule,
        }
    }

    /// One-off planning against a snapshot; the caller's context is untouched.
    pub fn plan_single(
        &self,
        call: &ToolCall,
        context: &SceneContext,
        history: &[ToolCall],
        audit: &mut AuditTrail,
    ) -> SupervisedCall {
        let mut view = context.clone();
        self.supervise(call, &mut view, history, audit)
    }
}
