//! Streaming wavelet forecasting.
//!
//! This crate decomposes a sliding window of a scalar series with an orthogonal
//! Daubechies wavelet, reuses the coefficients that the shift-variance theorem
//! proves unchanged between consecutive windows, and forecasts the next sample
//! by predicting the next crystal coefficient by coefficient.
//!
//! ```
//! use wavecast::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::with_window(2, 64)).unwrap();
//! let series: Vec<f64> = (0..200).map(|t| (t as f64 * 0.1).sin()).collect();
//! for t in 0..100 {
//!     engine.update(&series[t..t + 64]).unwrap();
//! }
//! let next = engine.predict().unwrap();
//! assert!(next.is_finite());
//! ```

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod network;
pub mod predictor;
pub mod reduced;
pub mod theorem;
pub mod transform;

pub use buffer::{Crystal, History, RollingBuffer};
pub use calibration::{Calibrated, Calibration, CalibrationLine};
pub use config::{EngineConfig, LearnedConfig};
pub use engine::{Engine, ForecastCycle};
pub use error::{Error, Result};
pub use filter::{FilterBank, WaveletOrder};
pub use network::Network;
pub use predictor::{
    CoefficientPredictor, LearnedPredictor, Predictor, PredictorBank, TheoremPredictor,
};
pub use reduced::ReducedTransform;
pub use theorem::ShiftVarianceTheorem;
pub use transform::WaveletTransform;
