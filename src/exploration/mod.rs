//! Orchestration of exploration runs.

mod explorer;

pub use explorer::{
    ExplorationConfig, ExplorationError, ExplorationSummary, Explorer, MODEL_FILE_NAME,
    TRACE_FILE_NAME,
};
