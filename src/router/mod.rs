pub mod goal;
pub mod supervisor;

pub use goal::{CurrentGoal, Route, RouterDecision};
pub use supervisor::RouterSupervisor;
