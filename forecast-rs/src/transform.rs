//! Pyramidal fast wavelet transform with cyclic boundaries.
//!
//! A crystal is laid out as `[scaling | coarsest details | ... | finest details]`.
//! The forward pass filters the window into approximations (lower half) and
//! details (upper half), then recurses on the lower half until it is as short
//! as the smallest power of two covering the filter. The inverse pass replays
//! the levels bottom-up.
//!
//! Every coefficient is produced by [`convolve`], which accumulates taps in a
//! fixed order. The reduced transform relies on this to reproduce the full
//! transform bit for bit.

use crate::error::{Error, Result};
use crate::filter::{FilterBank, WaveletOrder};

/// Cyclic correlation of `signal` with `taps`, starting at `start`.
///
/// Indices wrap around the end of `signal`.
#[inline]
pub(crate) fn convolve(signal: &[f64], start: usize, taps: &[f64]) -> f64 {
    let n = signal.len();
    let mut acc = 0.0;
    for (z, &tap) in taps.iter().enumerate() {
        acc += signal[(start + z) % n] * tap;
    }
    acc
}

/// Smallest power of two that covers a filter of length `filter_len`.
pub(crate) fn scaling_size(filter_len: usize) -> usize {
    filter_len.next_power_of_two()
}

/// Check that a window length is a power of two no shorter than the filter.
pub(crate) fn check_window(len: usize, filter_len: usize) -> Result<()> {
    if len < filter_len || !len.is_power_of_two() {
        return Err(Error::Size {
            len,
            min: scaling_size(filter_len),
        });
    }
    Ok(())
}

/// Forward and inverse transform over one [`FilterBank`].
#[derive(Debug, Clone)]
pub struct WaveletTransform {
    filters: FilterBank,
    scaling_size: usize,
}

impl WaveletTransform {
    /// Transform over an explicit filter bank.
    pub fn new(filters: FilterBank) -> Self {
        let scaling_size = scaling_size(filters.len());
        Self {
            filters,
            scaling_size,
        }
    }

    /// Transform backed by the Daubechies filters of `order`.
    pub fn daubechies(order: WaveletOrder) -> Self {
        Self::new(FilterBank::new(order))
    }

    /// Get the filter bank.
    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }

    /// Filter length 2N.
    pub fn filter_len(&self) -> usize {
        self.filters.len()
    }

    /// Length of the scaling block at the head of every crystal.
    pub fn scaling_size(&self) -> usize {
        self.scaling_size
    }

    /// Forward transform of `window` into a new crystal.
    pub fn transform(&self, window: &[f64]) -> Result<Vec<f64>> {
        let mut crystal = vec![0.0; window.len()];
        self.transform_into(window, &mut crystal)?;
        Ok(crystal)
    }

    /// Forward transform writing into `crystal`, which must match `window` in length.
    pub fn transform_into(&self, window: &[f64], crystal: &mut [f64]) -> Result<()> {
        let size = window.len();
        check_window(size, self.filter_len())?;
        if crystal.len() != size {
            return Err(Error::WindowMismatch {
                expected: size,
                actual: crystal.len(),
            });
        }

        let mut input = window.to_vec();
        let mut n = size;
        while n >= self.filter_len() {
            self.analyze_level(&input[..n], &mut crystal[..n]);
            let half = n >> 1;
            input[..half].copy_from_slice(&crystal[..half]);
            n = half;
        }
        Ok(())
    }

    /// Inverse transform of `crystal` back into the raw domain.
    pub fn invert(&self, crystal: &[f64]) -> Result<Vec<f64>> {
        let size = crystal.len();
        check_window(size, self.filter_len())?;

        let mut out = crystal.to_vec();
        let mut scratch = vec![0.0; size];
        let mut n = self.scaling_size;
        while n <= size {
            self.synthesize_level(&out[..n], &mut scratch[..n]);
            out[..n].copy_from_slice(&scratch[..n]);
            n <<= 1;
        }
        Ok(out)
    }

    /// One analysis step over `input`: approximations to the lower half of
    /// `output`, details to the upper half.
    pub(crate) fn analyze_level(&self, input: &[f64], output: &mut [f64]) {
        let half = input.len() >> 1;
        let (h, g) = (self.filters.h(), self.filters.g());
        for i in 0..half {
            output[i] = convolve(input, 2 * i, h);
            output[half + i] = convolve(input, 2 * i, g);
        }
    }

    /// One synthesis step: rebuild `2 * half` samples from an approximation/detail split.
    fn synthesize_level(&self, input: &[f64], output: &mut [f64]) {
        let half = input.len() >> 1;
        let support = self.filters.support();
        let (ih, ig) = (self.filters.ih(), self.filters.ig());
        // The first N-1 output pairs reach back across the start of the band.
        let lead = half - (support - 1);

        for k in 0..half {
            let mut even = 0.0;
            let mut odd = 0.0;
            for z in 0..support {
                let approx = (k + lead + z) % half;
                let detail = approx + half;
                even += input[approx] * ih[2 * z] + input[detail] * ih[2 * z + 1];
                odd += input[approx] * ig[2 * z] + input[detail] * ig[2 * z + 1];
            }
            output[2 * k] = even;
            output[2 * k + 1] = odd;
        }
    }
}
