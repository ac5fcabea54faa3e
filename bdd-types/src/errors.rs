use thiserror::Error;

/// Level value, re-exported here only for error message typing.
pub type Level = u64;

/// Errors surfaced at the interface boundary. Programmer contract
/// violations (NIL where forbidden, out-of-order pushes, level
/// inversions) are never represented here — those are `assert!`/`panic!`,
/// treated as bugs rather than recoverable failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BddError {
    #[error("expected level {expected}, found level {found}")]
    LevelMismatch { expected: Level, found: Level },

    #[error("variable level {level} exceeds configured max level {max_level}")]
    VariableOutOfRange { level: Level, max_level: Level },

    #[error("malformed arc file: {0}")]
    MalformedArcFile(String),

    #[error("counter overflowed its representation")]
    CounterOverflow,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BddError {
    fn from(value: std::io::Error) -> Self {
        BddError::Io(value.to_string())
    }
}
