use super::definition::WorkflowDefinition;
use crate::correction::{clamp_value, ClampOutcome};
use crate::model::{AuditKind, AuditTrail};
use crate::shared::serde_ext::parse_via_string;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModifierMatchMode {
    /// Case-insensitive substring: `straight` also fires inside `straightforward`.
    #[default]
    Substring,
    WordBoundary,
}

impl ModifierMatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::WordBoundary => "word_boundary",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "word_boundary" | "word-boundary" => Ok(Self::WordBoundary),
            _ => Err("modifier match mode must be one of: substring, word_boundary".to_string()),
        }
    }
}

impl std::fmt::Display for ModifierMatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ModifierMatchMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModifierMatchMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_via_string(deserializer, "modifier match mode", Self::parse)
    }
}

pub fn modifier_matches(keyword: &str, prompt: &str, mode: ModifierMatchMode) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    let prompt = prompt.to_lowercase();
    match mode {
        ModifierMatchMode::Substring => prompt.contains(&keyword),
        ModifierMatchMode::WordBoundary => prompt.match_indices(&keyword).any(|(start, _)| {
            let before = prompt[..start].chars().next_back();
            let after = prompt[start + keyword.len()..].chars().next();
            !before.map(char::is_alphanumeric).unwrap_or(false)
                && !after.map(char::is_alphanumeric).unwrap_or(false)
        }),
    }
}

/// Builds the variable environment: defaults, then every modifier whose
/// keyword occurs in `prompt` (declaration order, later wins), then
/// `explicit`. Declared parameter ranges clamp the result.
pub fn resolve_variables(
    definition: &WorkflowDefinition,
    explicit: &Map<String, Value>,
    prompt: &str,
    mode: ModifierMatchMode,
    audit: &mut AuditTrail,
) -> Map<String, Value> {
    let mut env = definition.defaults.clone();

    for modifier in &definition.modifiers {
        if !modifier_matches(&modifier.keyword, prompt, mode) {
            continue;
        }
        let keys = modifier
            .overrides
            .iter()
            .map(|(key, _)| key.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        audit.push(
            AuditKind::ModifierMatch,
            format!(
                "`{}` modifier `{}` matched the prompt; sets [{keys}]",
                definition.name, modifier.keyword
            ),
        );
        for (key, value) in &modifier.overrides {
            env.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in explicit {
        env.insert(key.clone(), value.clone());
    }

    for spec in &definition.parameters {
        let Some((min, max)) = spec.range else {
            continue;
        };
        let Some(current) = env.get(&spec.name) else {
            continue;
        };
        if let ClampOutcome::Clamped(clamped) = clamp_value(current, min, max) {
            audit.push(
                AuditKind::Clamp,
                format!(
                    "`{}` variable `{}` clamped from {current} to {clamped} (range {min}..{max})",
                    definition.name, spec.name
                ),
            );
            env.insert(spec.name.clone(), clamped);
        }
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_mode_fires_inside_longer_words() {
        assert!(modifier_matches(
            "straight",
            "a straightforward table",
            ModifierMatchMode::Substring
        ));
        assert!(!modifier_matches(
            "straight",
            "a straightforward table",
            ModifierMatchMode::WordBoundary
        ));
    }

    #[test]
    fn word_boundary_mode_matches_phrases_case_insensitively() {
        assert!(modifier_matches(
            "Straight Legs",
            "Table with straight legs, please",
            ModifierMatchMode::WordBoundary
        ));
        assert!(!modifier_matches("", "anything", ModifierMatchMode::Substring));
    }
}
