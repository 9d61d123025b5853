//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success, including searches that matched nothing
//! - `1`: General error
//! - `2`: Blocking error, automation should halt
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Document not found (code 3)
    NotFound = 3,

    /// Text could not be encoded or has the wrong dimension (code 4)
    EncodingError = 4,

    /// Snapshot or input file I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index snapshot corrupted (code 7)
    IndexCorrupted = 7,

    /// Input rejected: duplicate id or invalid metadata (code 8)
    InvalidInput = 8,

    /// Operation cancelled (code 9)
    Cancelled = 9,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Convert an `IndexError` to the appropriate exit code.
    pub fn from_error(error: &IndexError) -> Self {
        match error {
            IndexError::DocumentNotFound { .. } => ExitCode::NotFound,
            IndexError::Encoding { .. } | IndexError::Dimension { .. } => ExitCode::EncodingError,
            IndexError::Persistence { .. } => ExitCode::IoError,
            IndexError::Config { .. } => ExitCode::ConfigError,
            IndexError::CorruptState { .. } => ExitCode::IndexCorrupted,
            IndexError::DuplicateDocument { .. } | IndexError::Validation { .. } => {
                ExitCode::InvalidInput
            }
            IndexError::Cancelled { .. } => ExitCode::Cancelled,
            IndexError::SlotOutOfRange { .. } => ExitCode::BlockingError,
            IndexError::General(_) => ExitCode::GeneralError,
        }
    }

    /// Blocking errors should halt automation pipelines.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::EncodingError => "Encoding error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
            ExitCode::InvalidInput => "Invalid input",
            ExitCode::Cancelled => "Cancelled",
        }
    }
}
