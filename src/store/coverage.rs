//! Statement coverage monitoring for instrumented apps.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::model_store::StoreError;

/// Suffix of instrumentation files, following the apk file name.
pub const INSTRUMENTATION_FILE_SUFFIX: &str = ".apk.json";

/// Timestamp format of statement records logged on the device.
pub const STATEMENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static STATEMENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"dmid=(\d+)").unwrap());

/// One executed statement as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    pub timestamp: String,
    pub id: String,
}

impl StatementRecord {
    pub fn new(timestamp: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            id: id.into(),
        }
    }
}

impl StatementRecord {
    /// Parse a logged `<id>;<timestamp>` line.
    pub fn parse(line: &str) -> Option<Self> {
        let (id, timestamp) = line.trim().split_once(';')?;
        Some(Self::new(timestamp.trim(), id.trim()))
    }
}

/// Fetches the statements executed since the last call.
pub type StatementReader = Box<dyn Fn() -> Vec<StatementRecord> + Send + Sync>;

#[derive(Deserialize)]
struct InstrumentationFile {
    #[serde(rename = "allMethods")]
    all_methods: Vec<String>,
}

/// Tracks which instrumented statements were executed and when first.
///
/// Without instrumentation data the monitor still records statements but
/// reports a coverage of 0.
pub struct CoverageMonitor {
    instrumentation: HashMap<String, String>,
    executed: Mutex<HashMap<String, NaiveDateTime>>,
    reader: StatementReader,
}

impl CoverageMonitor {
    /// Create a monitor over a known instrumentation map.
    pub fn new(instrumentation: HashMap<String, String>, reader: StatementReader) -> Self {
        Self {
            instrumentation,
            executed: Mutex::new(HashMap::new()),
            reader,
        }
    }

    /// Create a monitor, loading instrumentation for `apk_name` from `dir`.
    ///
    /// A missing directory or file leaves coverage unmeasured.
    pub fn from_dir(
        dir: impl AsRef<Path>,
        apk_name: &str,
        reader: StatementReader,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let instrumentation = match find_instrumentation_file(dir, apk_name) {
            Some(path) => load_instrumentation(&path)?,
            None => {
                tracing::warn!(
                    "No instrumentation file for {} in {}; coverage will be monitored but not calculated",
                    apk_name,
                    dir.display()
                );
                HashMap::new()
            }
        };

        Ok(Self::new(instrumentation, reader))
    }

    pub fn instrumented_count(&self) -> usize {
        self.instrumentation.len()
    }

    pub fn executed_count(&self) -> usize {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Fetch new statement records and keep the first-seen time of each.
    ///
    /// Returns the number of statements seen for the first time.
    pub fn update(&self) -> usize {
        let records = (self.reader)();
        let mut executed = self.executed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;

        for record in records {
            let seen = match NaiveDateTime::parse_from_str(&record.timestamp, STATEMENT_TIMESTAMP_FORMAT)
            {
                Ok(seen) => seen,
                Err(e) => {
                    tracing::warn!("Invalid statement timestamp {:?}: {}", record.timestamp, e);
                    continue;
                }
            };
            if record.id.parse::<u64>().is_err() {
                tracing::warn!("Invalid statement id {:?}", record.id);
                continue;
            }

            if !executed.contains_key(&record.id) {
                executed.insert(record.id, seen);
                added += 1;
            }
        }

        let coverage = ratio(executed.len(), self.instrumentation.len());
        tracing::info!(
            "Current statement coverage: {:.4}. Encountered statements: {}",
            coverage,
            executed.len()
        );
        added
    }

    /// Executed over instrumented statements, or 0 without instrumentation.
    pub fn current_coverage(&self) -> f64 {
        ratio(self.executed_count(), self.instrumentation.len())
    }

    /// Executed statements sorted by first-seen time.
    pub fn snapshot(&self) -> Vec<(String, NaiveDateTime)> {
        let executed = self.executed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statements: Vec<_> = executed
            .iter()
            .map(|(id, seen)| (id.clone(), *seen))
            .collect();
        statements.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        statements
    }
}

fn ratio(executed: usize, instrumented: usize) -> f64 {
    if instrumented == 0 {
        0.0
    } else {
        executed as f64 / instrumented as f64
    }
}

/// Instrumentation file for `apk_name` in `dir`, if any.
pub fn find_instrumentation_file(dir: &Path, apk_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.contains(apk_name) && name.ends_with(INSTRUMENTATION_FILE_SUFFIX))
                .unwrap_or(false)
        })
}

/// Read the instrumented statements of an app, keyed by statement id.
pub fn load_instrumentation(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    let file: InstrumentationFile =
        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))?;

    let mut statements = HashMap::new();
    for method in file.all_methods {
        match STATEMENT_ID.captures(&method) {
            Some(caps) => {
                statements.insert(caps[1].to_string(), method);
            }
            None => tracing::warn!("Instrumented method without statement id: {}", method),
        }
    }

    Ok(statements)
}
