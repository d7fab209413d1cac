//! Engine error taxonomy.
//!
//! Missing data is NOT an error: absent observations propagate as `None`
//! through scoring and aggregation. The variants here cover the conditions
//! the engine must refuse to paper over.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed configuration (bad threshold ordering, empty tables, etc.).
    /// Fatal, surfaced immediately, never silently defaulted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every pillar was absent for the evaluation date. The composite is
    /// undefined in that case and the caller has to know.
    #[error("no active pillars for {date}: composite is undefined")]
    EmptyPillarSet { date: NaiveDate },

    /// Out-of-order append to a momentum history. Delta calculations assume
    /// monotonic time, so the tracker refuses rather than reordering.
    #[error("out-of-order append for '{entity}': {attempted} is not after {last}")]
    OrderingViolation {
        entity: String,
        last: NaiveDate,
        attempted: NaiveDate,
    },
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }
}
