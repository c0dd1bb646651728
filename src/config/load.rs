use super::{ConfigError, RouterSettings, WorkflowDocument, WorkflowValidationError};
use crate::workflow::WorkflowRegistry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const WORKFLOW_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Result of loading a workflow directory. Rejected documents are reported
/// next to the registry built from the rest.
#[derive(Debug, Default)]
pub struct WorkflowLoadReport {
    pub registry: WorkflowRegistry,
    pub rejected: Vec<(PathBuf, WorkflowValidationError)>,
}

pub fn load_settings(path: &Path) -> Result<RouterSettings, ConfigError> {
    let settings = RouterSettings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}

pub fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = fs::read_dir(dir).map_err(|source| ConfigError::ReadDir {
        path: dir.display().to_string(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| WORKFLOW_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every workflow file in `dir` in file-name order. A file that fails
/// to parse or validate is excluded and logged; the others still load.
pub fn load_workflow_dir(dir: &Path) -> Result<WorkflowLoadReport, ConfigError> {
    let mut report = WorkflowLoadReport::default();
    for path in workflow_files(dir)? {
        let origin = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("<unnamed>")
            .to_string();
        let loaded = WorkflowDocument::from_path(&path)
            .map_err(|err| WorkflowValidationError::new(&origin, err.to_string()))
            .and_then(WorkflowDocument::into_definition)
            .and_then(|definition| report.registry.insert(definition));
        if let Err(err) = loaded {
            warn!(path = %path.display(), error = %err, "workflow excluded");
            report.rejected.push((path, err));
        }
    }
    info!(
        dir = %dir.display(),
        loaded = report.registry.len(),
        rejected = report.rejected.len(),
        "workflow directory loaded"
    );
    Ok(report)
}
