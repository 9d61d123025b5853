//! CLI output: exit codes, the JSON envelope, and the output manager.

pub mod exit_code;
pub mod format;
pub mod output;

pub use exit_code::ExitCode;
pub use format::{JsonResponse, OutputFormat};
pub use output::OutputManager;
