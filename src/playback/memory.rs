//! Replay of recorded explorations against a live run.

use std::sync::Arc;

use super::trace::PlaybackTrace;
use crate::actions::ExplorationAction;
use crate::model::{ScreenContext, Widget};
use crate::store::ActionTrace;
use crate::strategy::{ExplorationStrategy, Priority, StrategyContext, StrategyError};

/// Default bound on recorded steps skipped while deciding one action.
pub const DEFAULT_MAX_CONSECUTIVE_SKIPS: usize = 128;

/// Replays recorded traces, matching recorded widgets to live ones.
///
/// A recorded widget that cannot be found on the live screen is skipped. The
/// number of steps skipped in a row is bounded; exceeding the bound is a
/// [`StrategyError::SkipLimitExceeded`].
#[derive(Debug, Clone)]
pub struct MemoryPlayback {
    package: String,
    traces: Vec<PlaybackTrace>,
    max_consecutive_skips: usize,
}

impl MemoryPlayback {
    pub fn new(package: impl Into<String>, traces: Vec<PlaybackTrace>) -> Self {
        Self {
            package: package.into(),
            traces,
            max_consecutive_skips: DEFAULT_MAX_CONSECUTIVE_SKIPS,
        }
    }

    /// Split a flat action log into traces, one per Reset.
    ///
    /// Steps recorded before the first Reset form a leading trace of their own.
    pub fn from_records<I>(package: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = (ExplorationAction, Arc<ScreenContext>)>,
    {
        let mut traces: Vec<PlaybackTrace> = Vec::new();

        for (action, screen) in records {
            if action.is_reset() || traces.is_empty() {
                traces.push(PlaybackTrace::new());
            }
            if let Some(trace) = traces.last_mut() {
                trace.add(action, screen);
            }
        }

        Self::new(package, traces)
    }

    /// Replay a recorded run.
    pub fn from_trace(trace: &ActionTrace) -> Self {
        Self::from_records(
            trace.package.clone(),
            trace
                .records
                .iter()
                .map(|record| (record.action.clone(), Arc::new(record.screen.clone()))),
        )
    }

    pub fn with_max_consecutive_skips(mut self, max: usize) -> Self {
        self.max_consecutive_skips = max;
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn traces(&self) -> &[PlaybackTrace] {
        &self.traces
    }

    /// Whether every trace was replayed to its end.
    pub fn is_complete(&self) -> bool {
        self.traces.iter().all(PlaybackTrace::is_complete)
    }

    /// Replay progress: per-trace explored ratios weighted by trace size.
    ///
    /// With `widget`, only steps acting on that widget are counted.
    pub fn get_exploration_ratio(&self, widget: Option<&Widget>) -> f64 {
        let total: usize = self.traces.iter().map(|t| t.size(widget)).sum();
        if total == 0 {
            return 0.0;
        }

        self.traces
            .iter()
            .map(|t| t.explored_ratio(widget) * (t.size(widget) as f64 / total as f64))
            .sum()
    }

    /// Next action to replay on the live screen.
    pub fn next_action(
        &mut self,
        context: &StrategyContext,
    ) -> Result<ExplorationAction, StrategyError> {
        let mut skipped = 0;

        loop {
            let trace = match self.traces.iter_mut().find(|t| !t.is_complete()) {
                Some(trace) => trace,
                None => return Ok(ExplorationAction::Terminate),
            };
            let entry = match trace.request_next() {
                Some(entry) => entry,
                None => continue,
            };

            match entry.action {
                ExplorationAction::WidgetAction { widget, gesture } => {
                    if let Some(live) = context.find_match(&widget, false) {
                        trace.explore();
                        return Ok(ExplorationAction::WidgetAction {
                            widget: live.clone(),
                            gesture,
                        });
                    }
                    if let Some(live) = context.find_match(&widget, true) {
                        tracing::warn!(
                            "Same widget not found. Located similar widget {} in a different position, selecting it",
                            live.to_short_string()
                        );
                        trace.explore();
                        return Ok(ExplorationAction::WidgetAction {
                            widget: live.clone(),
                            gesture,
                        });
                    }
                    tracing::debug!(
                        "Recorded widget {} not on screen, skipping",
                        widget.to_short_string()
                    );
                }
                ExplorationAction::PressBack => {
                    if context.screen.is_home_screen() {
                        tracing::debug!("Already on the home screen, skipping recorded back");
                    } else if context.screen.similarity(&entry.screen) == 1.0 {
                        trace.explore();
                        return Ok(ExplorationAction::PressBack);
                    } else {
                        let next_reachable = trace
                            .peek_next_widget_action()
                            .and_then(|next| next.action.widget())
                            .map(|w| context.find_match(w, true).is_some())
                            .unwrap_or(false);

                        if !next_reachable {
                            trace.explore();
                            return Ok(ExplorationAction::PressBack);
                        }
                        tracing::debug!("Next recorded widget is reachable, skipping recorded back");
                    }
                }
                action => {
                    trace.explore();
                    return Ok(action);
                }
            }

            skipped += 1;
            if skipped > self.max_consecutive_skips {
                return Err(StrategyError::SkipLimitExceeded(skipped));
            }
        }
    }
}

impl ExplorationStrategy for MemoryPlayback {
    fn name(&self) -> &'static str {
        "MemoryPlayback"
    }

    fn fitness(&self, _context: &StrategyContext) -> Result<Priority, StrategyError> {
        Ok(Priority::Playback)
    }

    fn decide(&mut self, context: &StrategyContext) -> Result<ExplorationAction, StrategyError> {
        self.next_action(context)
    }

    fn termination_reason(&self, _context: &StrategyContext) -> String {
        if self.is_complete() {
            "all recorded traces replayed".to_string()
        } else {
            "recorded trace terminated".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GestureKind;
    use crate::model::{button, Bounds, WidgetData};

    const APP: &str = "com.example.app";

    fn widget(data: WidgetData) -> Widget {
        Widget::new(data)
    }

    fn screen(widgets: Vec<Widget>) -> Arc<ScreenContext> {
        Arc::new(ScreenContext::new(widgets))
    }

    fn live(widgets: Vec<Widget>) -> StrategyContext {
        StrategyContext::new(screen(widgets), APP)
    }

    fn replay_all(playback: &mut MemoryPlayback, context: &StrategyContext) -> Vec<ExplorationAction> {
        let mut replayed = Vec::new();
        loop {
            let action = playback.decide(context).unwrap();
            let done = action.is_terminate();
            replayed.push(action);
            if done {
                return replayed;
            }
        }
    }

    #[test]
    fn test_partition_at_resets() {
        let w = widget(button("OK", "ok", Bounds::new(0, 0, 10, 10)));
        let s = screen(vec![w.clone()]);
        let playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::click(w.clone()), s.clone()),
                (ExplorationAction::Reset, s.clone()),
                (ExplorationAction::click(w.clone()), s.clone()),
                (ExplorationAction::Reset, s.clone()),
                (ExplorationAction::Terminate, s.clone()),
            ],
        );

        let sizes: Vec<_> = playback.traces().iter().map(|t| t.len()).collect();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert!(playback.traces()[1].entries()[0].action.is_reset());
    }

    #[test]
    fn test_full_replay_in_order() {
        let w = widget(button("OK", "ok", Bounds::new(0, 0, 100, 40)));
        let s = screen(vec![w.clone()]);
        let recorded = vec![
            ExplorationAction::Reset,
            ExplorationAction::click(w.clone()),
            ExplorationAction::Terminate,
        ];
        let mut playback =
            MemoryPlayback::from_records(APP, recorded.iter().cloned().map(|a| (a, s.clone())));
        let context = live(vec![w.clone()]);

        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::Reset);
        assert!(!playback.is_complete());
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::click(w));
        assert!(!playback.is_complete());
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::Terminate);
        assert!(playback.is_complete());
        assert_eq!(playback.get_exploration_ratio(None), 1.0);
    }

    #[test]
    fn test_moved_widget_is_replayed_at_new_position() {
        let recorded = widget(button("OK", "ok", Bounds::new(0, 0, 100, 40)));
        let moved = widget(button("OK", "ok", Bounds::new(0, 300, 100, 40)));
        let s = screen(vec![recorded.clone()]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::Reset, s.clone()),
                (ExplorationAction::click(recorded), s.clone()),
                (ExplorationAction::Terminate, s),
            ],
        );
        let context = live(vec![moved.clone()]);

        let replayed = replay_all(&mut playback, &context);
        assert_eq!(replayed.len(), 3);
        assert_eq!(
            replayed[1],
            ExplorationAction::WidgetAction {
                widget: moved,
                gesture: GestureKind::Click
            }
        );
    }

    #[test]
    fn test_missing_widget_is_skipped() {
        let gone = widget(button("Gone", "gone", Bounds::new(0, 0, 100, 40)));
        let anonymous = widget(button("", "", Bounds::new(0, 0, 100, 40)));
        let s = screen(vec![]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::Reset, s.clone()),
                (ExplorationAction::click(gone.clone()), s.clone()),
                (ExplorationAction::click(anonymous), s.clone()),
                (ExplorationAction::Terminate, s),
            ],
        );
        // An anonymous widget elsewhere must not match by content.
        let context = live(vec![widget(button("", "", Bounds::new(0, 500, 100, 40)))]);

        let replayed = replay_all(&mut playback, &context);
        assert_eq!(
            replayed,
            vec![ExplorationAction::Reset, ExplorationAction::Terminate]
        );
        assert_eq!(playback.get_exploration_ratio(None), 0.5);
        assert_eq!(playback.get_exploration_ratio(Some(&gone)), 0.0);
    }

    #[test]
    fn test_back_on_matching_screen_is_replayed() {
        let a = widget(button("A", "a", Bounds::new(0, 0, 100, 40)));
        let b = widget(button("B", "b", Bounds::new(0, 50, 100, 40)));
        let detail = screen(vec![a.clone(), b.clone()]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::PressBack, detail.clone()),
                (ExplorationAction::Terminate, detail),
            ],
        );

        let context = live(vec![a]);
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::PressBack);
    }

    #[test]
    fn test_back_is_replayed_without_later_widget_action() {
        let a = widget(button("A", "a", Bounds::new(0, 0, 100, 40)));
        let b = widget(button("B", "b", Bounds::new(0, 50, 100, 40)));
        let detail = screen(vec![a]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::PressBack, detail.clone()),
                (ExplorationAction::Terminate, detail),
            ],
        );

        // Live screen differs from the recording and nothing follows to jump to.
        let context = live(vec![b]);
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::PressBack);
        assert!(playback.traces()[0].entries()[0].is_explored());
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::Terminate);
        assert!(playback.is_complete());
    }

    #[test]
    fn test_back_is_skipped_when_next_widget_is_reachable() {
        let a = widget(button("A", "a", Bounds::new(0, 0, 100, 40)));
        let b = widget(button("B", "b", Bounds::new(0, 50, 100, 40)));
        let detail = screen(vec![a.clone()]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::PressBack, detail.clone()),
                (ExplorationAction::click(b.clone()), detail.clone()),
                (ExplorationAction::Terminate, detail),
            ],
        );

        // Live screen already shows where the back would have led.
        let context = live(vec![b.clone()]);
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::click(b));
        assert!(!playback.traces()[0].entries()[0].is_explored());
    }

    #[test]
    fn test_back_is_replayed_when_next_widget_is_unreachable() {
        let a = widget(button("A", "a", Bounds::new(0, 0, 100, 40)));
        let b = widget(button("B", "b", Bounds::new(0, 50, 100, 40)));
        let c = widget(button("C", "c", Bounds::new(0, 100, 100, 40)));
        let detail = screen(vec![a]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::PressBack, detail.clone()),
                (ExplorationAction::click(b), detail),
            ],
        );

        let context = live(vec![c]);
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::PressBack);
    }

    #[test]
    fn test_back_on_home_screen_is_skipped() {
        let mut icon = button("Example", "", Bounds::new(0, 0, 100, 100));
        icon.package_name = "com.android.launcher3".to_string();
        let s = screen(vec![]);
        let mut playback = MemoryPlayback::from_records(
            APP,
            vec![
                (ExplorationAction::PressBack, s.clone()),
                (ExplorationAction::Reset, s),
            ],
        );

        let context = live(vec![widget(icon)]);
        assert_eq!(playback.decide(&context).unwrap(), ExplorationAction::Reset);
    }

    #[test]
    fn test_skip_limit() {
        let s = screen(vec![]);
        let missing: Vec<_> = (0..5)
            .map(|i| {
                let w = widget(button(&format!("W{}", i), "", Bounds::new(0, 0, 10, 10)));
                (ExplorationAction::click(w), s.clone())
            })
            .collect();
        let mut playback = MemoryPlayback::from_records(APP, missing).with_max_consecutive_skips(3);

        assert!(matches!(
            playback.decide(&live(vec![])),
            Err(StrategyError::SkipLimitExceeded(4))
        ));
    }

    #[test]
    fn test_complete_playback_terminates() {
        let mut playback = MemoryPlayback::new(APP, vec![]);
        assert!(playback.is_complete());
        assert_eq!(
            playback.decide(&live(vec![])).unwrap(),
            ExplorationAction::Terminate
        );
        assert_eq!(playback.fitness(&live(vec![])).unwrap(), Priority::Playback);
    }
}
