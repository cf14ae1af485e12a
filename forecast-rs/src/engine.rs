//! Streaming forecast engine.
//!
//! The engine is fed one sliding window per sample. Each update transforms the
//! window (through the reduced transform once history is deep enough), appends
//! the crystal to history and retrains the predictor bank. A forecast predicts
//! the next crystal, calibrates it, inverts it and returns its last sample.

use crate::buffer::{Crystal, History};
use crate::calibration::{Calibrated, Calibration};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::predictor::PredictorBank;
use crate::reduced::ReducedTransform;
use crate::theorem::ShiftVarianceTheorem;
use crate::transform::WaveletTransform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// A forecast crystal next to the crystal that actually arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCycle {
    pub transform: Crystal,
    pub forecast: Crystal,
}

/// Sliding-window forecaster over one scalar series.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    wavelet: WaveletTransform,
    theorem: ShiftVarianceTheorem,
    calibration: Calibration,
    bank: PredictorBank,
    history: History,
    forecasts: History,
    inverted: History,
    last_window: Option<Vec<f64>>,
    pending: Option<Crystal>,
    last_cycle: Option<ForecastCycle>,
    /// Newest history rows produced from one unbroken run of windows.
    streak: usize,
    updates: u64,
}

impl Engine {
    /// Create an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let wavelet = WaveletTransform::daubechies(config.wavelet_order()?);
        let theorem = ShiftVarianceTheorem::for_transform(&wavelet, config.window)?;
        let calibration = Calibration::new(
            &wavelet,
            &theorem,
            config.calibration_delta,
            config.outlier_bound,
        )?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let bank = PredictorBank::new(&theorem, &config.learned, &mut rng)?;

        let copied = ReducedTransform::new(&wavelet, &theorem)?.copied_per_pass();
        let window = config.window;
        info!(
            wavelet = %wavelet.filters().name(),
            window,
            copied,
            theorem = bank.theorem_count(),
            learned = bank.learned_count(),
            min_history = bank.min_history(),
            "forecast engine ready"
        );

        Ok(Self {
            config,
            wavelet,
            theorem,
            calibration,
            bank,
            history: History::new(window, window),
            forecasts: History::new(window, window),
            inverted: History::new(window, window),
            last_window: None,
            pending: None,
            last_cycle: None,
            streak: 0,
            updates: 0,
        })
    }

    /// Ingest the newest window of the series.
    ///
    /// Consecutive calls are expected to receive windows shifted by one sample.
    /// A window that does not continue the previous one is transformed in full,
    /// and the reduced path resumes once enough continuous rows have built up.
    pub fn update(&mut self, window: &[f64]) -> Result<()> {
        self.check_window(window)?;

        let contiguous = self.follows_last_window(window);
        if !contiguous && self.last_window.is_some() {
            debug!(update = self.updates + 1, "window does not continue the stream");
        }
        let reduced = self.config.reduced_transform
            && contiguous
            && self.theorem.max_back_steps() > 0
            && self.streak >= self.theorem.max_back_steps();
        let crystal = if reduced {
            ReducedTransform::new(&self.wavelet, &self.theorem)?.reduce(window, &self.history)?
        } else {
            self.wavelet.transform(window)?
        };

        if let Some(forecast) = self.pending.take() {
            self.last_cycle = Some(ForecastCycle {
                transform: crystal.clone(),
                forecast,
            });
        }

        let was_full = self.history.is_full();
        self.history.push(crystal);
        let streak = if contiguous { self.streak + 1 } else { 1 };
        self.streak = streak.min(self.history.len());
        self.last_window = Some(window.to_vec());
        self.updates += 1;
        debug!(update = self.updates, reduced, depth = self.history.len(), "crystal appended");
        if !was_full && self.history.is_full() {
            info!(updates = self.updates, "history reached capacity");
        }

        match self.bank.update(&self.history) {
            Err(err) if err.is_insufficient_history() => {
                debug!(
                    depth = self.history.len(),
                    required = self.bank.min_history(),
                    "warming up, retraining skipped"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Forecast the next sample, calibrating against the last stored window.
    pub fn predict(&mut self) -> Result<f64> {
        self.ensure_history()?;
        let last = self
            .last_window
            .as_ref()
            .ok_or_else(|| Error::insufficient_history(self.bank.min_history(), 0))?;
        // Forthcoming window; the repeated sample stands in for the unknown one.
        let mut frame = last[1..].to_vec();
        frame.push(last[last.len() - 1]);
        self.forecast(&frame)
    }

    /// Forecast the next sample, calibrating against `window`.
    ///
    /// `window` is the forthcoming window: its last sample is the unknown being
    /// forecast and only serves as a placeholder.
    pub fn predict_window(&mut self, window: &[f64]) -> Result<f64> {
        self.check_window(window)?;
        self.ensure_history()?;
        self.forecast(window)
    }

    /// True once history holds a full window of crystals.
    pub fn trained(&self) -> bool {
        self.history.is_full()
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the wavelet transform.
    pub fn wavelet(&self) -> &WaveletTransform {
        &self.wavelet
    }

    /// Get the shift-variance theorem for this window.
    pub fn theorem(&self) -> &ShiftVarianceTheorem {
        &self.theorem
    }

    /// Get the forecast calibration.
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Get the predictor bank.
    pub fn bank(&self) -> &PredictorBank {
        &self.bank
    }

    /// Crystals of the ingested windows, oldest first.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Calibrated forecast crystals, oldest first.
    pub fn forecasts(&self) -> &History {
        &self.forecasts
    }

    /// Raw-domain reconstructions of the forecasts.
    pub fn inverted(&self) -> &History {
        &self.inverted
    }

    /// Number of successful updates.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// History depth `predict` needs.
    pub fn min_history(&self) -> usize {
        self.bank.min_history()
    }

    /// Most recent forecast paired with the crystal that followed it.
    pub fn last_cycle(&self) -> Option<&ForecastCycle> {
        self.last_cycle.as_ref()
    }

    /// Write the learned networks to `path`.
    pub fn save_predictors(&self, path: impl AsRef<Path>) -> Result<()> {
        self.bank.save_file(path)
    }

    /// Replace the learned networks with those stored at `path`.
    pub fn load_predictors(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.bank.load_file(path)
    }

    /// Per-scale layout of the crystal and the ordinals that must be learned.
    pub fn dump_variant_ordinals(&self) -> String {
        let th = &self.theorem;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} window={} max_scale={} scaling={}",
            self.wavelet.filters().name(),
            th.window(),
            th.max_scale(),
            th.scaling_size()
        );
        for scale in 1..=th.max_scale() {
            let (Some(start), Some(variant)) = (th.subband_boundary(scale), th.variant_count(scale))
            else {
                continue;
            };
            let _ = writeln!(
                out,
                "scale {scale}: ordinals {start}..{} variant={variant} back_steps={}",
                2 * start,
                1usize << scale
            );
        }
        let _ = writeln!(out, "learned: {:?}", self.bank.learned_ordinals());
        out
    }

    /// Transform, forecast and absolute error for every ordinal of the last
    /// forecast that has since been observed.
    pub fn dump_last_cycle(&self) -> Option<String> {
        self.dump_cycle(|_| true)
    }

    /// As [`Engine::dump_last_cycle`], restricted to learned ordinals.
    pub fn dump_last_cycle_variant(&self) -> Option<String> {
        self.dump_cycle(|ordinal| !self.theorem.is_invariant(ordinal))
    }

    fn dump_cycle(&self, include: impl Fn(usize) -> bool) -> Option<String> {
        let cycle = self.last_cycle.as_ref()?;
        let mut out = String::from("ordinal\ttransform\tforecast\tdiff\n");
        let pairs = cycle.transform.iter().zip(&cycle.forecast).enumerate();
        for (ordinal, (actual, forecast)) in pairs.filter(|(i, _)| include(*i)) {
            let _ = writeln!(
                out,
                "{ordinal}\t{actual:.9}\t{forecast:.9}\t{:.3e}",
                (actual - forecast).abs()
            );
        }
        Some(out)
    }

    fn check_window(&self, window: &[f64]) -> Result<()> {
        if window.len() != self.config.window {
            return Err(Error::WindowMismatch {
                expected: self.config.window,
                actual: window.len(),
            });
        }
        Ok(())
    }

    /// True if `window` is the previous window shifted by one sample.
    fn follows_last_window(&self, window: &[f64]) -> bool {
        match &self.last_window {
            Some(last) => last[1..] == window[..window.len() - 1],
            None => false,
        }
    }

    fn ensure_history(&self) -> Result<()> {
        let required = self.bank.min_history();
        if self.history.len() < required {
            return Err(Error::insufficient_history(required, self.history.len()));
        }
        Ok(())
    }

    fn forecast(&mut self, frame: &[f64]) -> Result<f64> {
        let predicted = self.bank.predict_crystal(&self.history)?;
        let Calibrated { crystal, .. } = self.calibration.calibrate(frame, &predicted)?;
        let inverse = self.wavelet.invert(&crystal)?;
        let value = inverse[inverse.len() - 1];

        self.pending = Some(crystal.clone());
        self.forecasts.push(crystal);
        self.inverted.push(inverse);
        debug!(value, forecasts = self.forecasts.len(), "forecast");
        Ok(value)
    }
}
