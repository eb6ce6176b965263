//! In-memory model of the screens discovered during one run.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ScreenContext, Widget};

/// Model store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
}

/// A widget together with how often it was acted upon on its screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetInfo {
    pub widget: Widget,
    pub acted_upon_count: u32,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Every observation, in order. Entries are never modified.
    observations: Vec<Arc<ScreenContext>>,
    /// Latest observation per screen id.
    screens: HashMap<Uuid, Arc<ScreenContext>>,
    /// Acted-upon counters keyed by `(screen id, widget id)`.
    acted: HashMap<(Uuid, Uuid), u32>,
}

/// Append-only log of observed screens plus acted-upon counters.
///
/// Shared between the exploration loop and readers through `&self`; every
/// read-modify-write happens under the lock, and readers get owned copies.
#[derive(Debug, Default)]
pub struct ModelStore {
    inner: RwLock<StoreInner>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation and return the shared handle to it.
    pub fn record_observation(&self, screen: ScreenContext) -> Arc<ScreenContext> {
        let screen = Arc::new(screen);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        inner.observations.push(screen.clone());
        inner.screens.insert(screen.uid(), screen.clone());
        screen
    }

    /// Count one more action on `widget_id` while `screen_id` was shown.
    pub fn increment_acted(&self, screen_id: Uuid, widget_id: Uuid) -> u32 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let count = inner.acted.entry((screen_id, widget_id)).or_insert(0);
        *count += 1;
        *count
    }

    pub fn acted_count(&self, screen_id: Uuid, widget_id: Uuid) -> u32 {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.acted.get(&(screen_id, widget_id)).copied().unwrap_or(0)
    }

    /// Widgets of the screen with their acted-upon counts, in screen order.
    ///
    /// Unknown screens yield an empty list.
    pub fn widgets_of(&self, screen_id: Uuid) -> Vec<WidgetInfo> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let screen = match inner.screens.get(&screen_id) {
            Some(screen) => screen,
            None => return Vec::new(),
        };

        screen
            .widgets()
            .iter()
            .map(|widget| WidgetInfo {
                widget: widget.clone(),
                acted_upon_count: inner
                    .acted
                    .get(&(screen_id, widget.uid()))
                    .copied()
                    .unwrap_or(0),
            })
            .collect()
    }

    /// Latest observation.
    pub fn latest(&self) -> Option<Arc<ScreenContext>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.observations.last().cloned()
    }

    pub fn observation_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.observations.len()
    }

    /// Number of distinct screens seen so far.
    pub fn screen_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.screens.len()
    }

    /// Consistent copy of the whole store.
    pub fn snapshot(&self) -> ModelSnapshot {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);

        let mut screens = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for observation in &inner.observations {
            if seen.insert(observation.uid()) {
                screens.push(observation.as_ref().clone());
            }
        }

        let mut acted: Vec<ActedRecord> = inner
            .acted
            .iter()
            .map(|(&(screen, widget), &count)| ActedRecord {
                screen,
                widget,
                count,
            })
            .collect();
        acted.sort_by_key(|r| (r.screen, r.widget));

        ModelSnapshot {
            observations: inner.observations.iter().map(|s| s.uid()).collect(),
            screens,
            acted,
        }
    }
}

/// Acted-upon counter of one widget on one screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActedRecord {
    pub screen: Uuid,
    pub widget: Uuid,
    pub count: u32,
}

/// Point-in-time copy of a [`ModelStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Screen id of every observation, in order.
    pub observations: Vec<Uuid>,
    /// Distinct screens in order of first observation.
    pub screens: Vec<ScreenContext>,
    pub acted: Vec<ActedRecord>,
}

impl ModelSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| StoreError::IoError(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))
    }

    /// Save the snapshot to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| StoreError::IoError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{button, Bounds};
    use std::thread;

    fn screen(labels: &[&str]) -> ScreenContext {
        ScreenContext::new(
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| Widget::new(button(l, l, Bounds::new(0, i as i32 * 50, 100, 40))))
                .collect(),
        )
    }

    #[test]
    fn test_record_and_count() {
        let store = ModelStore::new();
        let main = store.record_observation(screen(&["A", "B"]));
        let a = main.widgets()[0].uid();

        assert_eq!(store.increment_acted(main.uid(), a), 1);
        assert_eq!(store.increment_acted(main.uid(), a), 2);
        assert_eq!(store.acted_count(main.uid(), a), 2);

        let infos = store.widgets_of(main.uid());
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].acted_upon_count, 2);
        assert_eq!(infos[1].acted_upon_count, 0);
        assert!(store.widgets_of(Uuid::nil()).is_empty());
    }

    #[test]
    fn test_revisits_are_detected() {
        let store = ModelStore::new();
        store.record_observation(screen(&["A", "B"]));
        store.record_observation(screen(&["C"]));
        store.record_observation(screen(&["B", "A"]));

        assert_eq!(store.observation_count(), 3);
        assert_eq!(store.screen_count(), 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.screens.len(), 2);
        assert_eq!(snapshot.observations[0], snapshot.observations[2]);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = ModelStore::new();
        let main = store.record_observation(screen(&["A"]));
        let snapshot = store.snapshot();

        store.record_observation(screen(&["B"]));
        store.increment_acted(main.uid(), main.widgets()[0].uid());

        assert_eq!(snapshot.observations.len(), 1);
        assert!(snapshot.acted.is_empty());
    }

    #[test]
    fn test_concurrent_increments() {
        let store = Arc::new(ModelStore::new());
        let main = store.record_observation(screen(&["A"]));
        let (screen_id, widget_id) = (main.uid(), main.widgets()[0].uid());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment_acted(screen_id, widget_id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.acted_count(screen_id, widget_id), 400);
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let store = ModelStore::new();
        let main = store.record_observation(screen(&["A", "B"]));
        store.increment_acted(main.uid(), main.widgets()[1].uid());

        let path = std::env::temp_dir().join(format!("model_snapshot_{}.json", Uuid::new_v4()));
        let snapshot = store.snapshot();
        snapshot.save(&path).unwrap();

        let loaded = ModelSnapshot::load(&path).unwrap();
        assert_eq!(loaded.observations, snapshot.observations);
        assert_eq!(loaded.acted, snapshot.acted);
        assert_eq!(loaded.screens[0].uid(), main.uid());

        let _ = fs::remove_file(&path);
    }
}
