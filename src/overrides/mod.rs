pub mod engine;
pub mod rules;

pub use engine::{OverrideDecision, OverrideEngine, OverrideError};
pub use rules::{builtin_rules, OverrideRule, ReplacementSpec};
