//! Default exploration: act on the least-used widget.

use super::base::{ExplorationStrategy, Priority, StrategyContext, StrategyError};
use crate::actions::ExplorationAction;

/// Acts on the actionable widget with the lowest acted-upon count.
///
/// Ties go to the widget that comes first in screen order.
#[derive(Debug, Clone, Default)]
pub struct Explore;

impl Explore {
    pub fn new() -> Self {
        Self
    }
}

impl ExplorationStrategy for Explore {
    fn name(&self) -> &'static str {
        "Explore"
    }

    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError> {
        if context.actionable().next().is_some() {
            Ok(Priority::Explore)
        } else {
            Ok(Priority::None)
        }
    }

    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        let mut best = None;
        for info in context.actionable() {
            match best {
                Some((_, count)) if count <= info.acted_upon_count => {}
                _ => best = Some((&info.widget, info.acted_upon_count)),
            }
        }

        best.map(|(widget, _)| ExplorationAction::interact(widget.clone()))
            .ok_or_else(|| StrategyError::NoCandidate {
                strategy: self.name(),
                reason: "no actionable widget on screen".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{button, Bounds, ScreenContext, Widget};
    use std::sync::Arc;

    fn context(counts: &[(&str, u32)]) -> StrategyContext {
        let widgets: Vec<Widget> = counts
            .iter()
            .enumerate()
            .map(|(i, (text, _))| Widget::new(button(text, text, Bounds::new(0, i as i32 * 50, 100, 40))))
            .collect();
        let context = StrategyContext::new(Arc::new(ScreenContext::new(widgets)), "com.example.app");
        let widgets = context
            .widgets
            .iter()
            .cloned()
            .zip(counts)
            .map(|(mut info, (_, count))| {
                info.acted_upon_count = *count;
                info
            })
            .collect();
        context.with_widgets(widgets)
    }

    #[test]
    fn test_picks_least_acted_widget() {
        let mut explore = Explore::new();
        let context = context(&[("A", 2), ("B", 0), ("C", 0)]);

        assert_eq!(explore.fitness(&context).unwrap(), Priority::Explore);
        let action = explore.decide(&context).unwrap();
        assert_eq!(action.widget().unwrap().text(), "B");
    }

    #[test]
    fn test_decision_is_deterministic() {
        let mut explore = Explore::new();
        let context = context(&[("A", 1), ("B", 1)]);

        let first = explore.decide(&context).unwrap();
        let second = explore.decide(&context).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.widget().unwrap().text(), "A");
    }

    #[test]
    fn test_not_applicable_without_actionable_widgets() {
        let mut explore = Explore::new();
        let context = StrategyContext::new(Arc::new(ScreenContext::new(vec![])), "com.example.app");

        assert_eq!(explore.fitness(&context).unwrap(), Priority::None);
        assert!(matches!(
            explore.decide(&context),
            Err(StrategyError::NoCandidate { .. })
        ));
    }
}
