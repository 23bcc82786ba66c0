pub mod config;
pub mod error;
pub mod merge;
pub mod types;

pub use error::{SeptError, SeptResult};
pub use merge::{apply_snapshot, merge_todos, ImportSummary};
pub use types::AppSnapshot;
