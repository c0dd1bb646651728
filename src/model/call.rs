use super::audit::AuditTrail;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A named operation request. Fields are private so a call cannot be edited
/// after construction; corrections always build a new value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCall {
    name: String,
    #[serde(default)]
    params: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }

    /// Builds a call from a JSON object literal; non-object values yield no params.
    pub fn from_json(name: impl Into<String>, params: Value) -> Self {
        match params {
            Value::Object(params) => Self::new(name, params),
            _ => Self::bare(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.name, self.params)
    }
}

impl std::fmt::Display for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = serde_json::to_string(&self.params).map_err(|_| std::fmt::Error)?;
        write!(f, "{}({})", self.name, params)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorrectedToolCall {
    pub call: ToolCall,
    #[serde(default)]
    pub pre_steps: Vec<ToolCall>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl CorrectedToolCall {
    pub fn passthrough(call: ToolCall) -> Self {
        Self {
            call,
            pre_steps: Vec::new(),
            reasons: Vec::new(),
        }
    }

    pub fn is_modified_from(&self, original: &ToolCall) -> bool {
        !self.pre_steps.is_empty() || &self.call != original
    }

    /// Pre-steps first, in order, then the call itself.
    pub fn execution_order(&self) -> impl Iterator<Item = &ToolCall> {
        self.pre_steps.iter().chain(std::iter::once(&self.call))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Plan {
    pub calls: Vec<CorrectedToolCall>,
    pub audit: AuditTrail,
}

impl Plan {
    pub fn new(calls: Vec<CorrectedToolCall>, audit: AuditTrail) -> Self {
        Self { calls, audit }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn flatten(&self) -> Vec<ToolCall> {
        self.calls
            .iter()
            .flat_map(CorrectedToolCall::execution_order)
            .cloned()
            .collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.flatten()
            .into_iter()
            .map(|call| call.name().to_string())
            .collect()
    }

    /// SHA-256 over the canonical JSON of the flattened call list. Params are
    /// sorted maps, so equal plans always hash equally.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(&self.flatten()).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
