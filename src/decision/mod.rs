//! Decision points and version selection.

mod engine;
mod model;

pub use engine::DecisionEngine;
pub use model::{Mooclet, MoocletType, Policy, Version};
