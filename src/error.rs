use thiserror::Error;

/// Errors raised by the tutoring core.
///
/// Every variant rejects a single call; the state of whatever was called
/// (a session, a timing tracker) is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TutorError {
    #[error("invalid pitch name: {0:?}")]
    InvalidPitchName(String),

    #[error("invalid root note: {0:?}")]
    InvalidRootNote(String),

    #[error("invalid level {0}: levels run from 1 to 7")]
    InvalidLevel(u8),

    #[error("invalid tempo {0}: tempo must be a positive number of beats per minute")]
    InvalidTempo(f64),

    #[error("unknown {kind} type: {name:?}")]
    UnknownExerciseType { kind: &'static str, name: String },

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("song parse error: {0}")]
    SongParse(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TutorError>;
