//! Exploration model store, action recordings and coverage monitoring.

mod coverage;
mod model_store;
mod record;

pub use coverage::{
    find_instrumentation_file, load_instrumentation, CoverageMonitor, StatementReader,
    StatementRecord, INSTRUMENTATION_FILE_SUFFIX, STATEMENT_TIMESTAMP_FORMAT,
};
pub use model_store::{ActedRecord, ModelSnapshot, ModelStore, StoreError, WidgetInfo};
pub use record::{ActionRecord, ActionTrace};
