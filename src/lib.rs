// Public API exports
pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ports;
pub mod prettyprint;

// Re-export key types for easy access
pub use domain::error_chain::{render_report, ExceptionChain, LocalState, WrapErr};
pub use ports::tabular_store::TabularStore;
