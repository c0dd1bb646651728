use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetectedPattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Value,
}

impl DetectedPattern {
    pub fn new(pattern_type: impl Into<String>, confidence: f32, evidence: Value) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            pattern_type: pattern_type.into(),
            confidence,
            evidence,
        }
    }

    pub fn is(&self, pattern_type: &str) -> bool {
        self.pattern_type == pattern_type
    }
}
