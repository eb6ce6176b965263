//! Restart the app when the run starts or the app was left.

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use crate::actions::ExplorationAction;

/// Resets the app before the first action, and whenever the foreground
/// screen belongs neither to the app nor to a runtime permission dialog.
#[derive(Debug, Clone, Default)]
pub struct ResetOnLeave;

impl ResetOnLeave {
    pub fn new() -> Self {
        Self
    }
}

impl ExplorationStrategy for ResetOnLeave {
    fn name(&self) -> &'static str {
        "Reset"
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        let screen = &context.screen;
        let left_app =
            !screen.belongs_to_app(&context.app_package) && !screen.is_permission_dialog();

        if context.last_action.is_none() || left_app {
            Ok(Priority::Reset)
        } else {
            Ok(Priority::None)
        }
    }

    fn decide(&mut self, _context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        Ok(ExplorationAction::Reset)
    }
}
