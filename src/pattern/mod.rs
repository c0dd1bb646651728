pub mod heuristics;

pub use heuristics::{builtin_heuristics, DimensionHeuristic};

use crate::model::{DetectedPattern, SceneContext, ToolCall};
use serde_json::Value;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

pub trait ShapeHeuristic: Send + Sync {
    fn name(&self) -> &str;

    /// Confidence in `[0, 1]` plus evidence, or `None` when the shape does not apply.
    fn score(&self, context: &SceneContext, history: &[ToolCall]) -> Option<(f32, Value)>;
}

/// Stateless classifier. The best-scoring heuristic above the threshold wins;
/// equal scores keep the earlier-registered heuristic.
pub struct PatternDetector {
    heuristics: Vec<Box<dyn ShapeHeuristic>>,
    min_confidence: f32,
}

impl std::fmt::Debug for PatternDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternDetector")
            .field(
                "heuristics",
                &self.heuristics.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::with_builtin(DEFAULT_MIN_CONFIDENCE)
    }
}

impl PatternDetector {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            heuristics: Vec::new(),
            min_confidence,
        }
    }

    pub fn with_builtin(min_confidence: f32) -> Self {
        let mut detector = Self::new(min_confidence);
        for heuristic in builtin_heuristics() {
            detector.register(Box::new(heuristic));
        }
        detector
    }

    pub fn register(&mut self, heuristic: Box<dyn ShapeHeuristic>) {
        self.heuristics.push(heuristic);
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn detect(&self, context: &SceneContext, history: &[ToolCall]) -> Option<DetectedPattern> {
        let mut best: Option<DetectedPattern> = None;
        for heuristic in &self.heuristics {
            let Some((confidence, evidence)) = heuristic.score(context, history) else {
                continue;
            };
            if !confidence.is_finite() || confidence < self.min_confidence {
                continue;
            }
            let candidate = DetectedPattern::new(heuristic.name(), confidence, evidence);
            let better = best
                .as_ref()
                .map(|current| candidate.confidence > current.confidence)
                .unwrap_or(true);
            if better {
                best = Some(candidate);
            }
        }
        best
    }
}
