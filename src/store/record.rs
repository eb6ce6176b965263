//! Recording of decided actions, replayable by playback.

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::model_store::StoreError;
use crate::actions::ExplorationAction;
use crate::model::ScreenContext;

/// A performed action with the screen it was decided on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ExplorationAction,
    pub screen: ScreenContext,
    /// Time the action was performed (RFC 3339).
    pub timestamp: String,
}

impl ActionRecord {
    pub fn new(action: ExplorationAction, screen: ScreenContext) -> Self {
        Self {
            action,
            screen,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Every action of one run, in decision order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionTrace {
    /// Package of the explored app.
    pub package: String,
    pub records: Vec<ActionRecord>,
}

impl ActionTrace {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, action: ExplorationAction, screen: &ScreenContext) {
        self.records.push(ActionRecord::new(action, screen.clone()));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a trace from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| StoreError::IoError(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))
    }

    /// Save the trace to a JSON file.
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
