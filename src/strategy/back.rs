//! Press back once the current screen is fully explored.

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use crate::actions::ExplorationAction;

/// Presses back when every actionable widget on the screen was acted upon
/// more than `min_actions_per_widget` times.
#[derive(Debug, Clone)]
pub struct GuiFullyExploredBack {
    min_actions_per_widget: u32,
}

impl GuiFullyExploredBack {
    pub fn new(min_actions_per_widget: u32) -> Self {
        Self {
            min_actions_per_widget,
        }
    }
}

impl ExplorationStrategy for GuiFullyExploredBack {
    fn name(&self) -> &'static str {
        "GuiFullyExploredBack"
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        if context.all_widgets_exhausted(self.min_actions_per_widget) {
            Ok(Priority::Back)
        } else {
            Ok(Priority::None)
        }
    }

    fn decide(&mut self, _context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        Ok(ExplorationAction::PressBack)
    }
}
