use crate::expr::Expr;
use crate::shared::ids::WorkflowName;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub options: Vec<Value>,
    pub range: Option<(f64, f64)>,
}

impl ParameterSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            required: false,
            options: Vec::new(),
            range: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// Variable overrides applied when `keyword` appears in the prompt. Overrides
/// keep their declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub keyword: String,
    pub overrides: Vec<(String, Value)>,
}

impl Modifier {
    pub fn new(keyword: &str, overrides: Vec<(String, Value)>) -> Self {
        Self {
            keyword: keyword.to_string(),
            overrides,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Tool(String),
    Include(WorkflowName),
}

impl StepAction {
    pub fn label(&self) -> String {
        match self {
            Self::Tool(tool) => tool.clone(),
            Self::Include(name) => format!("include:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopSource {
    Count(Expr),
    Values(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSpec {
    pub source: LoopSource,
    pub var_name: String,
}

impl LoopSpec {
    pub fn count(count: Expr, var_name: &str) -> Self {
        Self {
            source: LoopSource::Count(count),
            var_name: var_name.to_string(),
        }
    }

    pub fn values(values: Vec<Expr>, var_name: &str) -> Self {
        Self {
            source: LoopSource::Values(values),
            var_name: var_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    pub action: StepAction,
    pub params: Vec<(String, Expr)>,
    pub condition: Option<Expr>,
    pub loop_spec: Option<LoopSpec>,
    pub description: Option<String>,
}

impl WorkflowStep {
    pub fn tool(name: &str) -> Self {
        Self::with_action(StepAction::Tool(name.to_string()))
    }

    pub fn include(workflow: WorkflowName) -> Self {
        Self::with_action(StepAction::Include(workflow))
    }

    fn with_action(action: StepAction) -> Self {
        Self {
            action,
            params: Vec::new(),
            condition: None,
            loop_spec: None,
            description: None,
        }
    }

    pub fn param(mut self, key: &str, value: Expr) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    pub fn when(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn repeat(mut self, loop_spec: LoopSpec) -> Self {
        self.loop_spec = Some(loop_spec);
        self
    }
}

/// A validated, immutable workflow. Built by the document loader or directly
/// in code.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub name: WorkflowName,
    pub description: String,
    pub category: Option<String>,
    pub sample_prompts: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
    pub defaults: Map<String, Value>,
    pub modifiers: Vec<Modifier>,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(name: WorkflowName, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name,
            description: String::new(),
            category: None,
            sample_prompts: Vec::new(),
            parameters: Vec::new(),
            defaults: Map::new(),
            modifiers: Vec::new(),
            steps,
        }
    }

    pub fn with_default(mut self, key: &str, value: Value) -> Self {
        self.defaults.insert(key.to_string(), value);
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_sample_prompts(mut self, prompts: &[&str]) -> Self {
        self.sample_prompts = prompts.iter().map(|prompt| prompt.to_string()).collect();
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|spec| spec.required)
    }

    /// Phrases offered to similarity scoring: the name in words, the
    /// description and every sample prompt.
    pub fn match_phrases(&self) -> Vec<String> {
        let mut phrases = vec![self.name.as_str().replace(['_', '-'], " ")];
        if !self.description.trim().is_empty() {
            phrases.push(self.description.clone());
        }
        phrases.extend(self.sample_prompts.iter().cloned());
        phrases
    }

    pub fn included_workflows(&self) -> Vec<&WorkflowName> {
        self.steps
            .iter()
            .filter_map(|step| match &step.action {
                StepAction::Include(name) => Some(name),
                StepAction::Tool(_) => None,
            })
            .collect()
    }
}
