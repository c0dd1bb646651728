pub mod engine;
pub mod rules;

pub use engine::{clamp_value, ClampOutcome, CorrectionEngine};
pub use rules::{CorrectionRules, ParamRange};
