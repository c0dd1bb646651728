pub mod matcher;
pub mod similarity;

pub use matcher::{IntentMatch, IntentMatcher, MissingParam};
pub use similarity::{BoundedScorer, LexicalScorer, ScorerError, SimilarityScorer, WorkflowCandidate};
