use super::{ConfigError, WorkflowValidationError};
use crate::expr::ast::is_identifier;
use crate::expr::Expr;
use crate::shared::ids::WorkflowName;
use crate::workflow::{
    LoopSource, LoopSpec, Modifier, ParameterSpec, StepAction, WorkflowDefinition, WorkflowStep,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::Path;

fn default_loop_var() -> String {
    "i".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDocument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<YamlValue>,
    #[serde(default)]
    pub options: Vec<YamlValue>,
    #[serde(default)]
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopDocument {
    #[serde(default)]
    pub count: Option<YamlValue>,
    #[serde(default)]
    pub values: Option<Vec<YamlValue>>,
    #[serde(default = "default_loop_var", alias = "varName", alias = "variable")]
    pub var_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepDocument {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub params: Mapping,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default, rename = "loop")]
    pub loop_spec: Option<LoopDocument>,
    #[serde(default)]
    pub description: Option<String>,
}

/// On-disk workflow shape. Mappings stay as YAML mappings so step params and
/// modifiers keep their declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sample_prompts: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDocument>,
    #[serde(default)]
    pub defaults: Mapping,
    #[serde(default)]
    pub modifiers: Mapping,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
}

impl WorkflowDocument {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    /// JSON documents parse through the same YAML reader.
    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn into_definition(self) -> Result<WorkflowDefinition, WorkflowValidationError> {
        let workflow = self.name.clone();
        let invalid = |reason: String| WorkflowValidationError::new(&workflow, reason);

        let name = WorkflowName::parse(&self.name).map_err(invalid)?;
        if self.steps.is_empty() {
            return Err(invalid("`steps` must be non-empty".to_string()));
        }

        let mut defaults = mapping_to_json(&self.defaults, "defaults").map_err(invalid)?;

        let mut parameters = Vec::with_capacity(self.parameters.len());
        for parameter in self.parameters {
            if !is_identifier(&parameter.name) {
                return Err(invalid(format!(
                    "parameter name `{}` must be an identifier",
                    parameter.name
                )));
            }
            if parameters
                .iter()
                .any(|existing: &ParameterSpec| existing.name == parameter.name)
            {
                return Err(invalid(format!(
                    "parameter `{}` is declared twice",
                    parameter.name
                )));
            }
            if let Some([min, max]) = parameter.range {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(invalid(format!(
                        "parameter `{}` range [{min}, {max}] is not a finite ascending range",
                        parameter.name
                    )));
                }
            }
            if let Some(default) = &parameter.default {
                if !defaults.contains_key(&parameter.name) {
                    let value = yaml_to_json(default, &parameter.name).map_err(invalid)?;
                    defaults.insert(parameter.name.clone(), value);
                }
            }
            let options = parameter
                .options
                .iter()
                .map(|option| yaml_to_json(option, &parameter.name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            parameters.push(ParameterSpec {
                name: parameter.name,
                description: parameter.description,
                required: parameter.required,
                options,
                range: parameter.range.map(|[min, max]| (min, max)),
            });
        }

        let mut modifiers = Vec::with_capacity(self.modifiers.len());
        for (keyword, overrides) in &self.modifiers {
            let keyword = mapping_key(keyword).map_err(invalid)?;
            if keyword.trim().is_empty() {
                return Err(invalid("modifier keywords must be non-empty".to_string()));
            }
            let YamlValue::Mapping(overrides) = overrides else {
                return Err(invalid(format!(
                    "modifier `{keyword}` must map variable names to values"
                )));
            };
            let mut pairs = Vec::with_capacity(overrides.len());
            for (key, value) in overrides {
                let key = mapping_key(key).map_err(invalid)?;
                let value = yaml_to_json(value, &key).map_err(invalid)?;
                pairs.push((key, value));
            }
            modifiers.push(Modifier::new(&keyword, pairs));
        }

        let steps = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                step.into_step().map_err(|reason| invalid(format!("step {}: {reason}", index + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WorkflowDefinition {
            name,
            description: self.description,
            category: self.category,
            sample_prompts: self.sample_prompts,
            parameters,
            defaults,
            modifiers,
            steps,
        })
    }
}

impl StepDocument {
    fn into_step(self) -> Result<WorkflowStep, String> {
        let action = match (self.tool, self.include) {
            (Some(tool), None) => {
                if tool.trim().is_empty() {
                    return Err("`tool` must be non-empty".to_string());
                }
                StepAction::Tool(tool.trim().to_string())
            }
            (None, Some(include)) => StepAction::Include(WorkflowName::parse(include.trim())?),
            (Some(_), Some(_)) => return Err("declare either `tool` or `include`, not both".to_string()),
            (None, None) => return Err("one of `tool` or `include` is required".to_string()),
        };

        let mut params = Vec::with_capacity(self.params.len());
        for (key, value) in &self.params {
            let key = mapping_key(key)?;
            params.push((key.clone(), yaml_to_expr(value, &key)?));
        }

        let condition = self
            .condition
            .as_deref()
            .map(Expr::parse_condition)
            .transpose()
            .map_err(|err| err.to_string())?;

        let loop_spec = self.loop_spec.map(LoopDocument::into_loop).transpose()?;

        Ok(WorkflowStep {
            action,
            params,
            condition,
            loop_spec,
            description: self.description,
        })
    }
}

impl LoopDocument {
    fn into_loop(self) -> Result<LoopSpec, String> {
        if !is_identifier(&self.var_name) {
            return Err(format!(
                "loop variable `{}` must be an identifier",
                self.var_name
            ));
        }
        let source = match (self.count, self.values) {
            (Some(count), None) => {
                let expr = yaml_to_expr(&count, "loop.count")?;
                if let Expr::Literal(literal) = &expr {
                    match literal.as_f64() {
                        Some(number) if number >= 0.0 && number.fract() == 0.0 => {}
                        _ => {
                            return Err(format!(
                                "loop count {literal} must be a non-negative integer"
                            ))
                        }
                    }
                }
                LoopSource::Count(expr)
            }
            (None, Some(values)) => LoopSource::Values(
                values
                    .iter()
                    .map(|value| yaml_to_expr(value, "loop.values"))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            (Some(_), Some(_)) => {
                return Err("loop declares both `count` and `values`".to_string())
            }
            (None, None) => return Err("loop requires `count` or `values`".to_string()),
        };
        Ok(LoopSpec {
            source,
            var_name: self.var_name,
        })
    }
}

fn mapping_key(key: &YamlValue) -> Result<String, String> {
    match key {
        YamlValue::String(text) => Ok(text.clone()),
        YamlValue::Number(number) => Ok(number.to_string()),
        YamlValue::Bool(flag) => Ok(flag.to_string()),
        other => Err(format!("mapping key {other:?} must be a scalar")),
    }
}

fn yaml_to_json(value: &YamlValue, context: &str) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("`{context}` is not representable as JSON: {err}"))
}

fn mapping_to_json(mapping: &Mapping, context: &str) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();
    for (key, value) in mapping {
        let key = mapping_key(key)?;
        let value = yaml_to_json(value, &format!("{context}.{key}"))?;
        out.insert(key, value);
    }
    Ok(out)
}

fn yaml_to_expr(value: &YamlValue, context: &str) -> Result<Expr, String> {
    match value {
        YamlValue::String(text) => Expr::parse_str(text).map_err(|err| format!("`{context}`: {err}")),
        YamlValue::Sequence(items) => Ok(Expr::List(
            items
                .iter()
                .map(|item| yaml_to_expr(item, context))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        YamlValue::Mapping(mapping) => {
            let mut entries = Vec::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = mapping_key(key)?;
                let nested = format!("{context}.{key}");
                entries.push((key, yaml_to_expr(value, &nested)?));
            }
            Ok(Expr::Map(entries))
        }
        YamlValue::Tagged(_) => Err(format!("`{context}` uses an unsupported YAML tag")),
        other => Ok(Expr::Literal(yaml_to_json(other, context)?)),
    }
}
