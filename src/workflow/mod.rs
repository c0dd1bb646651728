pub mod definition;
pub mod expansion;
pub mod registry;
pub mod variables;

pub use definition::{
    LoopSource, LoopSpec, Modifier, ParameterSpec, StepAction, WorkflowDefinition, WorkflowStep,
};
pub use expansion::{ExpansionEngine, ExpansionLimits};
pub use registry::WorkflowRegistry;
pub use variables::{modifier_matches, resolve_variables, ModifierMatchMode};
