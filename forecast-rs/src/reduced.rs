//! Sliding-window transform that reuses history for invariant details.

use crate::buffer::History;
use crate::error::{Error, Result};
use crate::theorem::ShiftVarianceTheorem;
use crate::transform::{check_window, convolve, WaveletTransform};

/// Forward transform that copies theorem-invariant details out of [`History`]
/// and convolves only the variant ones.
///
/// The output is bit-identical to [`WaveletTransform::transform`] on the same
/// window, provided the history rows were themselves produced from the
/// preceding windows of the same series.
#[derive(Debug, Clone, Copy)]
pub struct ReducedTransform<'a> {
    wavelet: &'a WaveletTransform,
    theorem: &'a ShiftVarianceTheorem,
}

impl<'a> ReducedTransform<'a> {
    /// Pair a transform with the theorem for its support.
    pub fn new(wavelet: &'a WaveletTransform, theorem: &'a ShiftVarianceTheorem) -> Result<Self> {
        if wavelet.filters().support() != theorem.support() {
            return Err(Error::invalid_config(format!(
                "theorem support {} does not match filter support {}",
                theorem.support(),
                wavelet.filters().support()
            )));
        }
        Ok(Self { wavelet, theorem })
    }

    /// History rows `reduce` needs before it can run.
    pub fn required_history(&self) -> usize {
        self.theorem.max_back_steps()
    }

    /// Number of coefficients a reduced pass copies instead of convolving.
    pub fn copied_per_pass(&self) -> usize {
        (1..=self.theorem.max_scale())
            .filter_map(|scale| {
                let half = self.theorem.subband_boundary(scale)?;
                Some(half - self.theorem.variant_count(scale)?)
            })
            .sum()
    }

    /// Transform `window`, recovering invariant details from `history`.
    ///
    /// `history` must not yet contain the crystal of `window` itself.
    pub fn reduce(&self, window: &[f64], history: &History) -> Result<Vec<f64>> {
        let size = window.len();
        let filter_len = self.wavelet.filter_len();
        check_window(size, filter_len)?;
        if size != self.theorem.window() {
            return Err(Error::WindowMismatch {
                expected: self.theorem.window(),
                actual: size,
            });
        }
        let required = self.required_history();
        if history.len() < required {
            return Err(Error::insufficient_history(required, history.len()));
        }
        if !history.is_empty() && history.width() != size {
            return Err(Error::WindowMismatch {
                expected: size,
                actual: history.width(),
            });
        }

        let (h, g) = (self.wavelet.filters().h(), self.wavelet.filters().g());
        let mut crystal = vec![0.0; size];
        let mut input = window.to_vec();
        let mut n = size;
        let mut scale = 1;

        while n >= filter_len {
            let half = n >> 1;
            match self.theorem.variant_count(scale) {
                Some(variant) => {
                    let row = history
                        .back(1 << scale)
                        .ok_or_else(|| Error::insufficient_history(1 << scale, history.len()))?;
                    let signal = &input[..n];
                    for i in 0..half {
                        crystal[i] = convolve(signal, 2 * i, h);
                    }
                    // Invariant details moved down one slot since the older crystal.
                    let copied = half - variant;
                    crystal[half..half + copied].copy_from_slice(&row[half + 1..half + 1 + copied]);
                    for i in copied..half {
                        crystal[half + i] = convolve(signal, 2 * i, g);
                    }
                }
                None => self.wavelet.analyze_level(&input[..n], &mut crystal[..n]),
            }
            input[..half].copy_from_slice(&crystal[..half]);
            n = half;
            scale += 1;
        }
        Ok(crystal)
    }
}
