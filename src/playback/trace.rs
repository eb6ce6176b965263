//! Recorded traces and replay progress.

use std::sync::Arc;

use crate::actions::ExplorationAction;
use crate::model::{ScreenContext, Widget};

/// One recorded step: the action and the screen it was taken on.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub action: ExplorationAction,
    pub screen: Arc<ScreenContext>,
    explored: bool,
}

impl TraceEntry {
    pub fn new(action: ExplorationAction, screen: Arc<ScreenContext>) -> Self {
        Self {
            action,
            screen,
            explored: false,
        }
    }

    /// Whether this step was replayed (as opposed to skipped or pending).
    pub fn is_explored(&self) -> bool {
        self.explored
    }

    fn targets(&self, widget: Option<&Widget>) -> bool {
        match widget {
            None => true,
            Some(widget) => self
                .action
                .widget()
                .map(|w| w.is_equivalent(widget))
                .unwrap_or(false),
        }
    }
}

/// Ordered recorded steps with a replay cursor.
///
/// The cursor only moves forward. A step the cursor passed is either
/// explored (replayed) or skipped.
#[derive(Debug, Clone, Default)]
pub struct PlaybackTrace {
    entries: Vec<TraceEntry>,
    cursor: usize,
}

impl PlaybackTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, action: ExplorationAction, screen: Arc<ScreenContext>) {
        self.entries.push(TraceEntry::new(action, screen));
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the next step to replay.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the cursor passed the last entry.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    /// Take the next step and move the cursor past it.
    pub fn request_next(&mut self) -> Option<TraceEntry> {
        let entry = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(entry)
    }

    /// Mark the step last returned by [`Self::request_next`] as replayed.
    pub fn explore(&mut self) {
        if let Some(index) = self.cursor.checked_sub(1) {
            if let Some(entry) = self.entries.get_mut(index) {
                entry.explored = true;
            }
        }
    }

    /// Next step without moving the cursor.
    pub fn peek_next(&self) -> Option<&TraceEntry> {
        self.entries.get(self.cursor)
    }

    /// First pending widget action, without moving the cursor.
    pub fn peek_next_widget_action(&self) -> Option<&TraceEntry> {
        self.entries[self.cursor.min(self.entries.len())..]
            .iter()
            .find(|entry| entry.action.widget().is_some())
    }

    /// Number of steps, or of steps acting on `widget`.
    pub fn size(&self, widget: Option<&Widget>) -> usize {
        self.entries.iter().filter(|e| e.targets(widget)).count()
    }

    /// Fraction of steps (acting on `widget`, if given) that were replayed.
    pub fn explored_ratio(&self, widget: Option<&Widget>) -> f64 {
        let size = self.size(widget);
        if size == 0 {
            return 0.0;
        }

        let explored = self
            .entries
            .iter()
            .filter(|e| e.targets(widget) && e.explored)
            .count();
        explored as f64 / size as f64
    }
}
