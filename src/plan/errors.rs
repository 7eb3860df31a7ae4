use thiserror::Error;

use crate::Timestamp;

/// Errors raised when appending an action would corrupt a plan.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("action window is inverted: start {start} is after end {end}")]
    InvertedWindow { start: Timestamp, end: Timestamp },

    #[error("action starting {start} overlaps the previous action ending {previous_end}")]
    OverlapsPrevious {
        start: Timestamp,
        previous_end: Timestamp,
    },

    #[error("drive action has an empty path")]
    EmptyDrivePath,
}
