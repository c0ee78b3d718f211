pub mod error_chain;
pub mod sheets;
pub mod table;

// Re-export commonly used types
pub use error_chain::{render_report, ExceptionChain, LocalState, WrapErr};
pub use table::normalize::{normalize, DatetimePrecision, NormalizeError, NormalizedTable};
pub use table::{Cell, Column, ColumnKind, Structured, Table, TableError};
