use thiserror::Error;

/// Errors raised while normalizing storage rows or user input into the
/// typed records the engines accept.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("NPS score {0} is outside the 0-10 range")]
    ScoreOutOfRange(i32),

    #[error("unknown client status: {0}")]
    UnknownClientStatus(String),

    #[error("coach capacity must be at least 1 unit, got {0}")]
    CapacityTooSmall(f64),

    #[error("default capacity must be greater than zero, got {0}")]
    DefaultCapacityNotPositive(f64),

    #[error("client units must be a non-negative number, got {0}")]
    NegativeUnits(f64),
}
