//! Shift-variance theorem for sliding-window wavelet transforms.
//!
//! When the window slides by one sample, most detail coefficients of the new
//! crystal already exist in an older crystal: a scale-`j` detail moves one
//! position down every `2^j` slides. Only the coefficients whose filter support
//! wraps past the window edge, counted per scale by the variant recurrence, have
//! to be recomputed.
//!
//! Scale `j` (1 = finest) occupies ordinals `[S >> j, S >> (j - 1))`. The
//! ordinals below `S >> max_scale` form the scaling block and are never
//! recoverable from history.

use crate::error::{Error, Result};
use crate::transform::{check_window, scaling_size, WaveletTransform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftVarianceTheorem {
    window: usize,
    support: usize,
    max_scale: usize,
    scaling_size: usize,
    /// `variant[j - 1]` = number of variant coefficients at scale `j`.
    variant: Vec<usize>,
    /// `bands[j]` = `window >> j`, for `j` in `0..=max_scale`.
    bands: Vec<usize>,
}

impl ShiftVarianceTheorem {
    /// Derive the theorem for a `window`-sample transform with wavelet support `support`.
    pub fn new(window: usize, support: usize) -> Result<Self> {
        if support == 0 {
            return Err(Error::UnsupportedOrder(support));
        }
        check_window(window, 2 * support)?;

        let scaling_size = scaling_size(2 * support);
        let max_scale = (window.trailing_zeros() - scaling_size.trailing_zeros()) as usize;

        let mut variant = Vec::with_capacity(max_scale);
        if max_scale >= 1 {
            variant.push(support);
        }
        for j in 2..=max_scale {
            let prev = variant[j - 2];
            // ceil((v + 1) / 2) + N - 1
            variant.push((prev + 1) / 2 + (prev + 1) % 2 + support - 1);
        }

        let bands = (0..=max_scale).map(|j| window >> j).collect();

        Ok(Self {
            window,
            support,
            max_scale,
            scaling_size,
            variant,
            bands,
        })
    }

    /// Theorem matching a transform's filter support.
    pub fn for_transform(transform: &WaveletTransform, window: usize) -> Result<Self> {
        Self::new(window, transform.filters().support())
    }

    /// Get the window size.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Wavelet support N.
    pub fn support(&self) -> usize {
        self.support
    }

    /// Deepest detail scale the theorem covers.
    pub fn max_scale(&self) -> usize {
        self.max_scale
    }

    /// Number of ordinals in the scaling block.
    pub fn scaling_size(&self) -> usize {
        self.scaling_size
    }

    /// Variant counts for scales `1..=max_scale`, finest first.
    pub fn variant_counts(&self) -> &[usize] {
        &self.variant
    }

    /// Variant count at scale `j`, if `j` is a theorem scale.
    pub fn variant_count(&self, scale: usize) -> Option<usize> {
        scale.checked_sub(1).and_then(|j| self.variant.get(j)).copied()
    }

    /// First ordinal of the band at `scale` (`window >> scale`).
    pub fn subband_boundary(&self, scale: usize) -> Option<usize> {
        self.bands.get(scale).copied()
    }

    /// Check if `ordinal` lies in the scaling block.
    pub fn is_scaling(&self, ordinal: usize) -> bool {
        ordinal < self.scaling_size
    }

    /// Scale of a detail ordinal.
    ///
    /// Fails for scaling ordinals and for ordinals past the window.
    pub fn scale_of(&self, ordinal: usize) -> Result<usize> {
        if ordinal < self.window {
            if let Some(scale) = self.bands.iter().position(|&b| b <= ordinal) {
                return Ok(scale);
            }
        }
        Err(Error::Range {
            ordinal,
            window: self.window,
        })
    }

    /// True if the ordinal can be copied from an earlier crystal.
    pub fn is_invariant(&self, ordinal: usize) -> bool {
        match self.scale_of(ordinal) {
            Ok(scale) => ordinal < self.bands[scale - 1] - self.variant[scale - 1],
            Err(_) => false,
        }
    }

    /// History rows to look back for an invariant ordinal's value: `2^scale`.
    pub fn back_steps(&self, ordinal: usize) -> Result<usize> {
        self.scale_of(ordinal).map(|scale| 1 << scale)
    }

    /// Depth of history needed to recover every invariant ordinal.
    pub fn max_back_steps(&self) -> usize {
        if self.max_scale == 0 {
            0
        } else {
            1 << self.max_scale
        }
    }

    /// Ordinals recoverable from history, ascending.
    pub fn invariant_ordinals(&self) -> Vec<usize> {
        (0..self.window).filter(|&i| self.is_invariant(i)).collect()
    }

    /// Ordinals that must be recomputed (or learned), ascending.
    pub fn variant_ordinals(&self) -> Vec<usize> {
        (0..self.window).filter(|&i| !self.is_invariant(i)).collect()
    }
}
