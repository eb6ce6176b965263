//! Grant runtime permissions when the system asks for them.

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use crate::actions::ExplorationAction;
use crate::model::{Widget, PERMISSION_ALLOW_BUTTON};

/// Clicks the allow button of runtime permission dialogs.
#[derive(Debug, Clone, Default)]
pub struct AllowRuntimePermission;

impl AllowRuntimePermission {
    pub fn new() -> Self {
        Self
    }

    /// The button granting the permission: by resource id first, then by
    /// an "ALLOW" or "OK" label.
    fn allow_button<'a>(&self, context: &'a StrategyContext) -> Option<&'a Widget> {
        let candidates: Vec<&Widget> = context
            .actionable()
            .map(|info| &info.widget)
            .collect();

        candidates
            .iter()
            .find(|w| w.resource_id().ends_with(PERMISSION_ALLOW_BUTTON))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|w| w.text().eq_ignore_ascii_case("allow"))
            })
            .or_else(|| candidates.iter().find(|w| w.text().eq_ignore_ascii_case("ok")))
            .copied()
    }
}

impl ExplorationStrategy for AllowRuntimePermission {
    fn name(&self) -> &'static str {
        "AllowRuntimePermission"
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        if context.screen.is_permission_dialog() && self.allow_button(context).is_some() {
            Ok(Priority::SpecificWidget)
        } else {
            Ok(Priority::None)
        }
    }

    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        let button = self
            .allow_button(context)
            .ok_or_else(|| StrategyError::NoCandidate {
                strategy: self.name(),
                reason: "no allow button on permission dialog".to_string(),
            })?;

        tracing::debug!("Granting runtime permission via {}", button.to_short_string());
        Ok(ExplorationAction::click(button.clone()))
    }
}
