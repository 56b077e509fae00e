//! Error types for the harness crate.

use std::fmt;
use std::path::PathBuf;

/// Errors producing a harness report.
#[derive(Debug)]
pub enum HarnessError {
    /// The report could not be encoded as JSON.
    ReportEncode { reason: String },
    /// The report file could not be written.
    ReportWrite { path: PathBuf, reason: String },
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReportEncode { reason } => write!(f, "failed to encode report: {reason}"),
            Self::ReportWrite { path, reason } => {
                write!(f, "failed to write report to {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for HarnessError {}
