//! Linear reconciliation of independently predicted coefficients.
//!
//! Each learned coefficient of the forthcoming crystal is an affine function of
//! the one unknown sample, `c = slope * x + intercept`. Two transforms of the
//! forthcoming window with its last sample perturbed recover every line. Each
//! predicted coefficient is solved for `x`; the mean of the in-bound solutions
//! is pushed back through all the lines, so the calibrated crystal agrees with a
//! single value of the unknown sample.

use crate::buffer::Crystal;
use crate::error::{Error, Result};
use crate::theorem::ShiftVarianceTheorem;
use crate::transform::WaveletTransform;
use tracing::{debug, warn};

/// Affine dependence of one coefficient on the perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationLine {
    pub ordinal: usize,
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient does not depend on the last sample at all.
    pub pinned: bool,
}

impl CalibrationLine {
    /// Shift that reproduces `value` on this line.
    pub fn solve(&self, value: f64) -> Result<f64> {
        if self.slope == 0.0 {
            return Err(Error::DegenerateCalibration {
                ordinal: self.ordinal,
            });
        }
        Ok((value - self.intercept) / self.slope)
    }

    /// Coefficient value at `shift`.
    pub fn apply(&self, shift: f64) -> f64 {
        self.slope * shift + self.intercept
    }
}

/// Calibrated crystal and the statistics of the solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibrated {
    pub crystal: Crystal,
    /// Mean shift applied to every line.
    pub shift: f64,
    pub inliers: usize,
    pub outliers: usize,
}

/// Reconcile `predicted` with `lines`.
///
/// Pinned lines take their intercept. Every other line must have a non-zero
/// slope; solutions with magnitude at or above `outlier_bound` are ignored when
/// averaging, and the shift is zero if none survive.
pub fn reconcile(
    lines: &[CalibrationLine],
    predicted: &[f64],
    outlier_bound: f64,
) -> Result<Calibrated> {
    if let Some(line) = lines.iter().find(|l| l.ordinal >= predicted.len()) {
        return Err(Error::Range {
            ordinal: line.ordinal,
            window: predicted.len(),
        });
    }

    let mut solved = Vec::with_capacity(lines.len());
    for line in lines.iter().filter(|l| !l.pinned) {
        solved.push(line.solve(predicted[line.ordinal])?);
    }

    let inliers: Vec<f64> = solved
        .iter()
        .copied()
        .filter(|x| x.abs() < outlier_bound)
        .collect();
    let outliers = solved.len() - inliers.len();
    let shift = if inliers.is_empty() {
        0.0
    } else {
        inliers.iter().sum::<f64>() / inliers.len() as f64
    };
    if inliers.is_empty() && !solved.is_empty() {
        warn!(outliers, bound = outlier_bound, "every calibration shift was an outlier");
    }

    let mut crystal = predicted.to_vec();
    for line in lines {
        crystal[line.ordinal] = if line.pinned {
            line.intercept
        } else {
            line.apply(shift)
        };
    }

    Ok(Calibrated {
        crystal,
        shift,
        inliers: inliers.len(),
        outliers,
    })
}

/// Calibration for one transform and window size.
#[derive(Debug, Clone)]
pub struct Calibration {
    wavelet: WaveletTransform,
    window: usize,
    delta: f64,
    outlier_bound: f64,
    /// Learned ordinals and whether each is pinned.
    ordinals: Vec<(usize, bool)>,
}

impl Calibration {
    /// Build the calibration and detect pinned ordinals from the impulse response.
    pub fn new(
        wavelet: &WaveletTransform,
        theorem: &ShiftVarianceTheorem,
        delta: f64,
        outlier_bound: f64,
    ) -> Result<Self> {
        if !(delta > 0.0) {
            return Err(Error::invalid_config(format!(
                "calibration delta must be positive, got {delta}"
            )));
        }
        let window = theorem.window();
        let mut impulse = vec![0.0; window];
        impulse[window - 1] = 1.0;
        let response = wavelet.transform(&impulse)?;

        let ordinals = theorem
            .variant_ordinals()
            .into_iter()
            .map(|i| (i, response[i] == 0.0))
            .collect();

        Ok(Self {
            wavelet: wavelet.clone(),
            window,
            delta,
            outlier_bound,
            ordinals,
        })
    }

    /// Get the perturbation applied to the last sample.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Get the magnitude at which a solved shift counts as an outlier.
    pub fn outlier_bound(&self) -> f64 {
        self.outlier_bound
    }

    /// Learned ordinals independent of the last sample.
    pub fn pinned_ordinals(&self) -> Vec<usize> {
        self.ordinals
            .iter()
            .filter(|(_, pinned)| *pinned)
            .map(|(i, _)| *i)
            .collect()
    }

    /// Lines for the learned ordinals of the crystal of `frame`.
    ///
    /// `frame` is the forthcoming window; its last sample is the unknown and is
    /// ignored.
    pub fn lines(&self, frame: &[f64]) -> Result<Vec<CalibrationLine>> {
        if frame.len() != self.window {
            return Err(Error::WindowMismatch {
                expected: self.window,
                actual: frame.len(),
            });
        }
        let anchor = frame[self.window - 2];
        let mut lowered = frame.to_vec();
        lowered[self.window - 1] = anchor - self.delta;
        let mut level = frame.to_vec();
        level[self.window - 1] = anchor;

        let c1 = self.wavelet.transform(&lowered)?;
        let c2 = self.wavelet.transform(&level)?;

        Ok(self
            .ordinals
            .iter()
            .map(|&(ordinal, pinned)| CalibrationLine {
                ordinal,
                slope: (c2[ordinal] - c1[ordinal]) / self.delta,
                intercept: c2[ordinal],
                pinned,
            })
            .collect())
    }

    /// Calibrate the learned ordinals of `predicted` against `frame`.
    pub fn calibrate(&self, frame: &[f64], predicted: &[f64]) -> Result<Calibrated> {
        if predicted.len() != self.window {
            return Err(Error::WindowMismatch {
                expected: self.window,
                actual: predicted.len(),
            });
        }
        let lines = self.lines(frame)?;
        let calibrated = reconcile(&lines, predicted, self.outlier_bound)?;
        debug!(
            shift = calibrated.shift,
            inliers = calibrated.inliers,
            outliers = calibrated.outliers,
            "calibrated forecast crystal"
        );
        Ok(calibrated)
    }
}
