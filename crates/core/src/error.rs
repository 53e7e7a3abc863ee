use crate::script::{SequenceId, StepId};

/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The script was rejected by the validator. No timeline may be built
    /// from it.
    #[error("script validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The application configuration could not be read or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Free-form runtime failure, e.g. a poisoned lock.
    #[error("{0}")]
    Message(String),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Reasons a script can be rejected. Only the first violation found is
/// reported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid script format: {0}")]
    MalformedInput(String),

    #[error("unsupported script version: {found}")]
    UnsupportedVersion { found: String },

    #[error("script must contain at least one sequence")]
    EmptyScript,

    #[error(
        "sequences must be ordered by strictly increasing id, found id {found} after {previous}"
    )]
    OutOfOrderSequence { previous: i64, found: i64 },

    #[error("sequence {sequence} must contain at least one step")]
    EmptySequence { sequence: SequenceId },

    #[error(
        "steps in sequence {sequence} must be ordered by strictly increasing id, found id {found} after {previous}"
    )]
    OutOfOrderStep {
        sequence: SequenceId,
        previous: i64,
        found: i64,
    },

    #[error(
        "step {step} in sequence {sequence} has a duration of {duration_sec}s, outside the allowed range [{min_sec}, {max_sec}]"
    )]
    DurationOutOfRange {
        sequence: SequenceId,
        step: StepId,
        duration_sec: f64,
        min_sec: i64,
        max_sec: i64,
    },

    #[error("step {step} in sequence {sequence} has metronome enabled but {reason}")]
    InvalidBpm {
        sequence: SequenceId,
        step: StepId,
        reason: BpmProblem,
    },

    #[error("step {step} in sequence {sequence} has an invalid touch mode: '{mode}'")]
    InvalidTouchMode {
        sequence: SequenceId,
        step: StepId,
        mode: String,
    },
}

/// Detail attached to [`ValidationError::InvalidBpm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpmProblem {
    Missing,
    OutOfRange { bpm: i64, min: i64, max: i64 },
    NotPositive { bpm: i64 },
}

impl std::fmt::Display for BpmProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "no BPM is provided"),
            Self::OutOfRange { bpm, min, max } => {
                write!(f, "a BPM of {bpm}, outside the allowed range [{min}, {max}]")
            }
            Self::NotPositive { bpm } => write!(f, "a non-positive BPM of {bpm}"),
        }
    }
}
