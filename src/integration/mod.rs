//! Integration level resolution and per-stage degradation strategy.

mod resolver;
mod strategy;

pub use resolver::resolve;
pub use strategy::{StageMode, StageStrategy};
