use crate::model::ToolCall;
use crate::shared::ids::RuleId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_confidence_threshold() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReplacementSpec {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub inherit: Vec<String>,
}

impl ReplacementSpec {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            params: Map::new(),
            inherit: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn inheriting(mut self, key: &str) -> Self {
        self.inherit.push(key.to_string());
        self
    }

    /// Literal params seed the call; inherited names then copy from the
    /// original call and overwrite literals with the same key.
    pub fn build(&self, original: &Map<String, Value>) -> ToolCall {
        let mut params = self.params.clone();
        for key in &self.inherit {
            if let Some(value) = original.get(key) {
                params.insert(key.clone(), value.clone());
            }
        }
        ToolCall::new(self.tool.clone(), params)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OverrideRule {
    pub id: RuleId,
    pub trigger_tool: String,
    #[serde(default)]
    pub trigger_pattern: Option<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    pub replacements: Vec<ReplacementSpec>,
    #[serde(default)]
    pub description: Option<String>,
}

impl OverrideRule {
    pub fn new(id: RuleId, trigger_tool: &str, replacements: Vec<ReplacementSpec>) -> Self {
        Self {
            id,
            trigger_tool: trigger_tool.to_string(),
            trigger_pattern: None,
            confidence_threshold: default_confidence_threshold(),
            replacements,
            description: None,
        }
    }

    pub fn on_pattern(mut self, pattern: &str, threshold: f32) -> Self {
        self.trigger_pattern = Some(pattern.to_string());
        self.confidence_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.trigger_tool.trim().is_empty() {
            return Err(format!("override rule `{}` has an empty trigger_tool", self.id));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "override rule `{}` confidence_threshold must be within [0, 1]",
                self.id
            ));
        }
        if self.replacements.is_empty() {
            return Err(format!("override rule `{}` has no replacements", self.id));
        }
        if self
            .replacements
            .iter()
            .any(|spec| spec.tool.trim().is_empty())
        {
            return Err(format!(
                "override rule `{}` has a replacement with an empty tool name",
                self.id
            ));
        }
        Ok(())
    }
}

pub fn builtin_rules() -> Vec<OverrideRule> {
    let mut rules = Vec::new();
    if let Ok(id) = RuleId::parse("phone_screen_inset") {
        let mut rule = OverrideRule::new(
            id,
            "mesh_extrude_region",
            vec![
                ReplacementSpec::new("mesh_inset").with_param("thickness", Value::from(0.03)),
                ReplacementSpec::new("mesh_extrude_region").inheriting("move"),
            ],
        )
        .on_pattern("phone_like", 0.7);
        rule.description =
            Some("inset before extruding so a screen recess keeps a bezel".to_string());
        rules.push(rule);
    }
    if let Ok(id) = RuleId::parse("tower_segmented_extrude") {
        let mut rule = OverrideRule::new(
            id,
            "mesh_extrude_region",
            vec![
                ReplacementSpec::new("mesh_subdivide").with_param("number_cuts", Value::from(3)),
                ReplacementSpec::new("mesh_extrude_region").inheriting("move"),
            ],
        )
        .on_pattern("tower_like", 0.7);
        rule.description = Some("subdivide tall shapes before extruding".to_string());
        rules.push(rule);
    }
    rules
}
