pub mod app;
pub mod config;
pub mod correction;
pub mod expr;
pub mod intent;
pub mod model;
pub mod overrides;
pub mod pattern;
pub mod pipeline;
pub mod router;
pub mod shared;
pub mod simulation;
pub mod workflow;
