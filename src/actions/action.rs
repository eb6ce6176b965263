//! Exploration actions produced by strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Widget;

/// Pre-classified gesture dispatched to a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureKind {
    Click,
    LongClick,
    /// Toggle a checkable widget.
    Tick,
}

impl GestureKind {
    /// The natural gesture for a widget.
    pub fn for_widget(widget: &Widget) -> Self {
        let data = widget.data();
        if data.is_checkable() {
            Self::Tick
        } else if data.long_clickable && !data.clickable {
            Self::LongClick
        } else {
            Self::Click
        }
    }
}

/// The next step of an exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplorationAction {
    /// Restart the app under exploration.
    Reset,
    /// End the exploration.
    Terminate,
    PressBack,
    WidgetAction {
        widget: Widget,
        gesture: GestureKind,
    },
    /// Only observe the screen.
    Empty,
}

impl ExplorationAction {
    pub fn click(widget: Widget) -> Self {
        Self::WidgetAction {
            widget,
            gesture: GestureKind::Click,
        }
    }

    /// Act on `widget` with its natural gesture.
    pub fn interact(widget: Widget) -> Self {
        let gesture = GestureKind::for_widget(&widget);
        Self::WidgetAction { widget, gesture }
    }

    /// The targeted widget, for widget actions.
    pub fn widget(&self) -> Option<&Widget> {
        match self {
            Self::WidgetAction { widget, .. } => Some(widget),
            _ => None,
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate)
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }

    /// Short type name used in logs and traces.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::Terminate => "Terminate",
            Self::PressBack => "PressBack",
            Self::WidgetAction { .. } => "WidgetAction",
            Self::Empty => "Empty",
        }
    }
}

impl fmt::Display for ExplorationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WidgetAction { widget, gesture } => {
                write!(f, "{:?} {}", gesture, widget.to_short_string())
            }
            other => write!(f, "{}", other.action_type()),
        }
    }
}
