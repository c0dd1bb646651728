use crate::model::{DetectedPattern, Plan, RouterStatus};
use crate::shared::ids::WorkflowName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurrentGoal {
    pub goal_text: String,
    #[serde(default)]
    pub resolved_params: Map<String, Value>,
}

impl CurrentGoal {
    pub fn new(goal_text: &str, resolved_params: Map<String, Value>) -> Self {
        Self {
            goal_text: goal_text.to_string(),
            resolved_params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Manual,
    Workflow { name: WorkflowName },
    Passthrough,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Workflow { .. } => "workflow",
            Self::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterDecision {
    pub route: Route,
    pub status: RouterStatus,
    pub plan: Plan,
    pub pattern: Option<DetectedPattern>,
}
