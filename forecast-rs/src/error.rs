//! Error types for the transform, theorem and forecasting layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Window length is not a power of two, or shorter than the filter support.
    #[error("window of length {len} is not a power of two of at least {min} samples")]
    Size { len: usize, min: usize },

    /// Window length does not match the size an engine or theorem was built for.
    #[error("window length mismatch: expected {expected}, got {actual}")]
    WindowMismatch { expected: usize, actual: usize },

    /// Ordinal outside the detail bands (scaling coefficient or past the window).
    #[error("coefficient ordinal {ordinal} is outside the detail bands of a {window}-sample crystal")]
    Range { ordinal: usize, window: usize },

    #[error("insufficient history: {available} crystals available, {required} required")]
    InsufficientHistory { required: usize, available: usize },

    #[error("calibration slope of ordinal {ordinal} is zero")]
    DegenerateCalibration { ordinal: usize },

    #[error("unsupported wavelet order {0}, expected 2..=10")]
    UnsupportedOrder(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("corrupt model: {0}")]
    CorruptModel(String),
}

impl Error {
    /// Build an [`Error::InsufficientHistory`].
    pub fn insufficient_history(required: usize, available: usize) -> Self {
        Error::InsufficientHistory {
            required,
            available,
        }
    }

    /// Build an [`Error::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// True for the warm-up condition the engine tolerates during `update`.
    pub fn is_insufficient_history(&self) -> bool {
        matches!(self, Error::InsufficientHistory { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
