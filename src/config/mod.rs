pub mod error;
pub mod load;
pub mod settings;
pub mod workflow_file;

pub use error::{ConfigError, WorkflowValidationError};
pub use load::{load_settings, load_workflow_dir, workflow_files, WorkflowLoadReport};
pub use settings::{IntentSettings, ModifierSettings, PatternSettings, RouterSettings};
pub use workflow_file::{LoopDocument, ParameterDocument, StepDocument, WorkflowDocument};
