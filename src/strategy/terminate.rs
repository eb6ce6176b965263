//! Termination of the exploration on a configurable criterion.

use std::time::Duration;

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use crate::actions::ExplorationAction;

/// Condition ending an exploration run.
pub trait TerminationCriterion: Send + Sync {
    /// Whether the run must end now.
    fn met(&self, context: &StrategyContext) -> bool;

    /// Human-readable reason, logged when the run ends.
    fn met_reason(&self, context: &StrategyContext) -> String;
}

/// Met once `limit` actions were issued.
#[derive(Debug, Clone, Copy)]
pub struct ActionBudget {
    limit: usize,
}

impl ActionBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TerminationCriterion for ActionBudget {
    fn met(&self, context: &StrategyContext) -> bool {
        context.action_count >= self.limit
    }

    fn met_reason(&self, context: &StrategyContext) -> String {
        format!(
            "action budget of {} reached after {} actions",
            self.limit, context.action_count
        )
    }
}

/// Met once the run has lasted `limit`.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    limit: Duration,
}

impl TimeBudget {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl TerminationCriterion for TimeBudget {
    fn met(&self, context: &StrategyContext) -> bool {
        context.elapsed >= self.limit
    }

    fn met_reason(&self, context: &StrategyContext) -> String {
        format!(
            "time budget of {:?} reached after {:?}",
            self.limit, context.elapsed
        )
    }
}

/// Ends the run as soon as its criterion is met.
pub struct Terminate {
    criterion: Box<dyn TerminationCriterion>,
}

impl Terminate {
    pub fn new(criterion: impl TerminationCriterion + 'static) -> Self {
        Self {
            criterion: Box::new(criterion),
        }
    }

    pub fn action_budget(limit: usize) -> Self {
        Self::new(ActionBudget::new(limit))
    }

    pub fn time_budget(limit: Duration) -> Self {
        Self::new(TimeBudget::new(limit))
    }
}

impl std::fmt::Debug for Terminate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminate").finish_non_exhaustive()
    }
}

impl ExplorationStrategy for Terminate {
    fn name(&self) -> &'static str {
        "Terminate"
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        if self.criterion.met(context) {
            Ok(Priority::Terminate)
        } else {
            Ok(Priority::None)
        }
    }

    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        tracing::info!("Terminating exploration: {}", self.criterion.met_reason(context));
        Ok(ExplorationAction::Terminate)
    }

    fn termination_reason(&self, context: &StrategyContext) -> String {
        self.criterion.met_reason(context)
    }
}
