use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source produced no usable track, or the tokenizer produced no tokens.
    #[error("Malformed track: {0}")]
    MalformedTrack(String),

    /// Too few bars or tokens to form any window. A zero-output outcome, not a crash.
    #[error("Insufficient structure: {0}")]
    InsufficientStructure(String),

    #[error("Invalid track data: {0}")]
    InvalidTrackData(String),

    #[error("Unsupported timing: {0}")]
    UnsupportedTiming(String),
}

impl PrepError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
