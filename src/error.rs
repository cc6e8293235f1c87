use thiserror::Error;

use crate::{Cell, MatrixShape};

#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Invalid sample rate: {0} (must be positive and finite)")]
    InvalidSampleRate(f64),

    #[error("Matrix needs at least one input and one output, got {inputs}x{outputs}")]
    EmptyMatrix { inputs: usize, outputs: usize },

    #[error("Matrix shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        expected: MatrixShape,
        found: MatrixShape,
    },

    #[error("Cell {cell} is outside a {shape} matrix")]
    CellOutOfRange { cell: Cell, shape: MatrixShape },

    #[error("Route parse error: {0}")]
    Route(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "wav")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[cfg(feature = "live")]
    #[error("Audio stream error: {0}")]
    Audio(String),
}

pub type MixerResult<T> = Result<T, MixerError>;
