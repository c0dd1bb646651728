#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowValidationError),
}

/// A workflow document that parsed but cannot be used. The loader excludes
/// it and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("workflow `{workflow}` failed validation: {reason}")]
pub struct WorkflowValidationError {
    pub workflow: String,
    pub reason: String,
}

impl WorkflowValidationError {
    pub fn new(workflow: &str, reason: impl Into<String>) -> Self {
        Self {
            workflow: workflow.to_string(),
            reason: reason.into(),
        }
    }
}
