use super::definition::WorkflowDefinition;
use crate::config::WorkflowValidationError;
use std::collections::BTreeMap;

/// Read-only after construction. Iteration follows insertion order, which
/// decides ties during intent matching.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Vec<WorkflowDefinition>,
    index: BTreeMap<String, usize>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = WorkflowDefinition>,
    ) -> Result<Self, WorkflowValidationError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, definition: WorkflowDefinition) -> Result<(), WorkflowValidationError> {
        let name = definition.name.as_str().to_string();
        if self.index.contains_key(&name) {
            return Err(WorkflowValidationError::new(
                &name,
                "a workflow with this name is already registered",
            ));
        }
        self.index.insert(name, self.workflows.len());
        self.workflows.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.index
            .get(name)
            .and_then(|position| self.workflows.get(*position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowDefinition> {
        self.workflows.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workflows
            .iter()
            .map(|definition| definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
