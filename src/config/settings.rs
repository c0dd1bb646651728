use super::ConfigError;
use crate::correction::{CorrectionEngine, CorrectionRules};
use crate::overrides::{OverrideEngine, OverrideRule};
use crate::pattern::{PatternDetector, DEFAULT_MIN_CONFIDENCE};
use crate::pipeline::CallPipeline;
use crate::workflow::{ExpansionLimits, ModifierMatchMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn default_enabled() -> bool {
    true
}

fn default_match_threshold() -> f32 {
    0.45
}

fn default_scorer_timeout_ms() -> u64 {
    2000
}

fn default_min_confidence() -> f32 {
    DEFAULT_MIN_CONFIDENCE
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct IntentSettings {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_scorer_timeout_ms")]
    pub scorer_timeout_ms: u64,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            scorer_timeout_ms: default_scorer_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PatternSettings {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModifierSettings {
    #[serde(default)]
    pub match_mode: ModifierMatchMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouterSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub intent: IntentSettings,
    #[serde(default)]
    pub expansion: ExpansionLimits,
    #[serde(default)]
    pub pattern: PatternSettings,
    #[serde(default)]
    pub modifiers: ModifierSettings,
    #[serde(default)]
    pub correction: CorrectionRules,
    #[serde(default)]
    pub overrides: Vec<OverrideRule>,
    #[serde(default)]
    pub replace_builtin_overrides: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            intent: IntentSettings::default(),
            expansion: ExpansionLimits::default(),
            pattern: PatternSettings::default(),
            modifiers: ModifierSettings::default(),
            correction: CorrectionRules::default(),
            overrides: Vec::new(),
            replace_builtin_overrides: false,
        }
    }
}

impl RouterSettings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.intent.match_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Settings(
                "`intent.match_threshold` must be within [0, 1]".to_string(),
            ));
        }
        if self.intent.scorer_timeout_ms == 0 {
            return Err(ConfigError::Settings(
                "`intent.scorer_timeout_ms` must be >= 1".to_string(),
            ));
        }
        let min_confidence = self.pattern.min_confidence;
        if !min_confidence.is_finite() || !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::Settings(
                "`pattern.min_confidence` must be within [0, 1]".to_string(),
            ));
        }
        self.expansion.validate().map_err(ConfigError::Settings)?;
        self.correction
            .validate()
            .map_err(|err| ConfigError::Settings(format!("correction: {err}")))?;
        for rule in &self.overrides {
            rule.validate().map_err(ConfigError::Settings)?;
        }
        Ok(())
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.intent.scorer_timeout_ms)
    }

    /// Correction table, built-in heuristics and the override table
    /// (built-ins first unless replaced, then configured rules in order).
    pub fn build_pipeline(&self) -> Result<CallPipeline, ConfigError> {
        let mut overrides = if self.replace_builtin_overrides {
            OverrideEngine::new()
        } else {
            OverrideEngine::with_builtin()
        };
        for rule in &self.overrides {
            overrides
                .register_rule(rule.clone())
                .map_err(|err| ConfigError::Settings(err.to_string()))?;
        }
        Ok(CallPipeline::new(
            CorrectionEngine::new(self.correction.clone()),
            PatternDetector::with_builtin(self.pattern.min_confidence),
            overrides,
        ))
    }
}
