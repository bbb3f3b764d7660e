use thiserror::Error;

use crate::validator::ValidationReport;

#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("snapshot rejected: {}", .0.errors.join("; "))]
    InvalidSnapshot(ValidationReport),

    #[error("snapshot at minute {incoming} arrived after minute {last}")]
    OutOfOrderSnapshot { last: u16, incoming: u16 },

    #[error("config version {found} is not supported (expected {expected})")]
    ConfigVersion { expected: u32, found: u32 },
}

impl AnalysisError {
    /// Validation report when the pipeline refused a snapshot.
    pub fn validation(&self) -> Option<&ValidationReport> {
        match self {
            AnalysisError::InvalidSnapshot(report) => Some(report),
            _ => None,
        }
    }
}
