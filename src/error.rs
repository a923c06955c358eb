use std::path::PathBuf;

use thiserror::Error;

use crate::grid::Coord;

/// Everything that can stop a session before it finishes on its own.
///
/// A quit key or an interrupt is not an error; see [`crate::trial::TrialFlow`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TaskError {
    #[error("key {key:?} is not bound in the {preset} key map")]
    UnknownInput { key: String, preset: &'static str },

    #[error("puzzle #{puzzle} needs a starting corner but all four are used")]
    ExhaustedCorners { puzzle: u32 },

    #[error("timing schedule not found at {}", path.display())]
    MissingSchedule { path: PathBuf },

    #[error("malformed schedule: {0}")]
    MalformedSchedule(String),

    #[error("malformed puzzle: {0}")]
    MalformedPuzzle(String),

    #[error("cursor position {0} is outside the 6x6 grid")]
    OutOfBounds(Coord),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
