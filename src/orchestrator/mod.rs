//! Orchestrator - the iteration loop and its decision logic
//!
//! - LoopController: runs a Run to a terminal status
//! - StateMachine: validated loop state transitions
//! - DecisionRules: per-iteration continuation verdict
//! - CancelToken: cooperative cancel checked at iteration boundaries
//! - Pipeline: the four stage adapters in slot order

mod cancel;
mod controller;
mod decision;
mod pipeline;
mod state;

pub use cancel::CancelToken;
pub use controller::{ControllerConfig, LoopController, RunOutcome};
pub use decision::DecisionRules;
pub use pipeline::Pipeline;
pub use state::{LoopState, StateMachine};
