pub mod audit;
pub mod call;
pub mod pattern;
pub mod scene;
pub mod status;

pub use audit::{AuditEntry, AuditKind, AuditTrail};
pub use call::{CorrectedToolCall, Plan, ToolCall};
pub use pattern::DetectedPattern;
pub use scene::{Mode, ObjectInfo, RequiredMode, SceneContext, SelectionCounts, TopologyHints};
pub use status::RouterStatus;
