use thiserror::Error;

use crate::tab::{Pitch, StringNumber, Time};
use crate::weights::Category;

#[derive(Debug, Error)]
pub enum AdornError {
    #[error("no feasible adornment for pitch {pitch} at {start}")]
    NoFeasibleAdornment { pitch: Pitch, start: Time },
    #[error("malformed measure {measure}: {reason}")]
    MalformedMeasure { measure: usize, reason: String },
    #[error("no {category:?} weight for '{key}'")]
    UnknownWeight { category: Category, key: String },
    #[error("objective weight {0} is outside [-1, 1]")]
    InvalidObjectiveWeight(f64),
    #[error("invalid time signature '{0}'")]
    InvalidTimeSignature(String),
    #[error("string {string} is not part of the tuning")]
    UnknownString { string: StringNumber },
    #[error("could not parse weights or configuration: {0}")]
    Weights(#[from] serde_json::Error),
}
