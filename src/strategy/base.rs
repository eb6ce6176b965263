//! Strategy capability, priorities and the per-step decision context.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::actions::ExplorationAction;
use crate::model::{ScreenContext, Widget};
use crate::store::WidgetInfo;

/// Arbitration priority of a strategy for the current step.
///
/// Declaration order is the total order: a later variant beats every
/// earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Not applicable.
    None,
    Explore,
    Back,
    /// A particular widget must be acted upon (e.g. a permission dialog).
    SpecificWidget,
    Reset,
    Playback,
    Terminate,
}

/// Strategy errors. All of them abort the run.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Playback skipped {0} consecutive recorded steps")]
    SkipLimitExceeded(usize),
    #[error("Strategy {strategy} cannot decide: {reason}")]
    NoCandidate {
        strategy: &'static str,
        reason: String,
    },
}

/// Everything a strategy may look at when scoring and deciding.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    /// The screen currently shown.
    pub screen: Arc<ScreenContext>,
    /// Widgets of the current screen with their acted-upon counts.
    pub widgets: Vec<WidgetInfo>,
    /// Actions issued so far in this run.
    pub action_count: usize,
    /// Time since the run started.
    pub elapsed: Duration,
    /// The previously issued action.
    pub last_action: Option<ExplorationAction>,
    /// Package of the app under exploration.
    pub app_package: String,
}

impl StrategyContext {
    /// Context with zeroed counters for a screen.
    pub fn new(screen: Arc<ScreenContext>, app_package: impl Into<String>) -> Self {
        let widgets = screen
            .widgets()
            .iter()
            .map(|widget| WidgetInfo {
                widget: widget.clone(),
                acted_upon_count: 0,
            })
            .collect();

        Self {
            screen,
            widgets,
            action_count: 0,
            elapsed: Duration::ZERO,
            last_action: None,
            app_package: app_package.into(),
        }
    }

    pub fn with_widgets(mut self, widgets: Vec<WidgetInfo>) -> Self {
        self.widgets = widgets;
        self
    }

    pub fn with_action_count(mut self, action_count: usize) -> Self {
        self.action_count = action_count;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_last_action(mut self, action: Option<ExplorationAction>) -> Self {
        self.last_action = action;
        self
    }

    /// Actionable widgets with their counts, in screen order.
    pub fn actionable(&self) -> impl Iterator<Item = &WidgetInfo> {
        self.widgets.iter().filter(|info| info.widget.can_be_acted_upon())
    }

    /// Whether every actionable widget was acted upon more than `threshold`
    /// times.
    pub fn all_widgets_exhausted(&self, threshold: u32) -> bool {
        self.actionable()
            .all(|info| info.acted_upon_count > threshold)
    }

    /// Whether a live widget matches `widget`, optionally at any position.
    ///
    /// Position-independent matching requires the recorded widget to carry
    /// a text or a resource id.
    pub fn find_match(&self, widget: &Widget, ignore_location: bool) -> Option<&Widget> {
        if !ignore_location {
            return self.screen.find_equivalent(widget);
        }
        if widget.text().is_empty() && widget.resource_id().is_empty() {
            return None;
        }
        self.screen.find_equivalent_ignore_location(widget)
    }
}

/// Capability shared by all strategies.
pub trait ExplorationStrategy {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// How strongly this strategy wants to decide the current step.
    fn fitness(&self, context: &StrategyContext) -> Result<Priority, StrategyError>;

    /// Produce the next action. Only called on the arbitration winner.
    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError>;

    /// Why a `Terminate` decided by this strategy ends the run.
    fn termination_reason(&self, _context: &StrategyContext) -> String {
        format!("{} decided to terminate", self.name())
    }
}
