//! Terminal output for the CLI.

pub mod tables;

pub use tables::{TableBuilder, create_failures_table, create_results_table, create_stats_table};
