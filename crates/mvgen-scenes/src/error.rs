//! Scene engine error types.

use thiserror::Error;

/// Result type for scene planning.
pub type SceneResult<T> = Result<T, SceneError>;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Invalid clip duration: {0}")]
    InvalidClipDuration(f64),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(u32),

    #[error("Transcript span {index} is out of order or malformed")]
    UnorderedTranscript { index: usize },

    #[error("Anchor palette is empty")]
    EmptyPalette,
}
