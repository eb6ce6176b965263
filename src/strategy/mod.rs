//! Exploration strategies and the engine arbitrating between them.

mod back;
mod base;
mod engine;
mod explore;
mod permission;
mod pool;
mod reset;
mod terminate;

pub use back::GuiFullyExploredBack;
pub use base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
pub use engine::{
    EngineConfig, EngineError, EngineState, ExhaustionCallback, ExplorationEngine,
    DEFAULT_EXHAUSTION_THRESHOLD,
};
pub use explore::Explore;
pub use permission::AllowRuntimePermission;
pub use pool::Strategy;
pub use reset::ResetOnLeave;
pub use terminate::{ActionBudget, Terminate, TerminationCriterion, TimeBudget};
