//! Client-side orchestration for Tidings: chaining server tools into an
//! answer and keeping a record of each exchange.

mod history;
mod orchestrator;

pub use history::{DEFAULT_HISTORY_DIR, HistoryError, HistoryStore, safe_file_stem};
pub use orchestrator::{Answer, Orchestrator, PipelineConfig, PipelineError};
