//! Daubechies filter banks.
//!
//! A [`FilterBank`] holds the four filters of one orthogonal Daubechies wavelet:
//! the analysis low-pass `H` (literature coefficients), the analysis high-pass
//! `G` obtained by alternating-sign reversal of `H`, and the synthesis pair
//! `Ih`/`Ig` obtained by deinterleaving `H` and `G`. All four have length `2N`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Smallest supported wavelet order.
pub const MIN_ORDER: usize = 2;

/// Largest supported wavelet order.
pub const MAX_ORDER: usize = 10;

// Daubechies low-pass analysis coefficients, order 2 through 10.
const DAUBECHIES: [&[f64]; MAX_ORDER - MIN_ORDER + 1] = [
    &[
        0.48296291314469025,
        0.83651630373746899,
        0.22414386804185735,
        -0.12940952255092145,
    ],
    &[
        0.33267055295095688,
        0.80689150931333875,
        0.45987750211933132,
        -0.13501102001039084,
        -0.085441273882241486,
        0.035226291882100656,
    ],
    &[
        0.23037781330885523,
        0.71484657055254153,
        0.63088076792959036,
        -0.027983769416983849,
        -0.18703481171888114,
        0.030841381835986965,
        0.032883011666982945,
        -0.010597401784997278,
    ],
    &[
        0.16010239797412501,
        0.60382926979747287,
        0.72430852843857441,
        0.13842814590110342,
        -0.24229488706619015,
        -0.03224486958502952,
        0.077571493840065148,
        -0.0062414902130117052,
        -0.012580751999015526,
        0.0033357252850015492,
    ],
    &[
        0.11154074335008017,
        0.49462389039838539,
        0.75113390802157753,
        0.3152503517092432,
        -0.22626469396516913,
        -0.12976686756709563,
        0.097501605587079362,
        0.027522865530016288,
        -0.031582039318031156,
        0.0005538422009938016,
        0.0047772575110106514,
        -0.0010773010849955799,
    ],
    &[
        0.077852054085062364,
        0.39653931948230575,
        0.72913209084655506,
        0.4697822874053586,
        -0.14390600392910627,
        -0.22403618499416572,
        0.071309219267050042,
        0.080612609151065898,
        -0.038029936935034633,
        -0.01657454163101562,
        0.012550998556013784,
        0.00042957797300470274,
        -0.0018016407039998328,
        0.00035371380000103988,
    ],
    &[
        0.054415842243081609,
        0.31287159091446592,
        0.67563073629801285,
        0.58535468365486909,
        -0.015829105256023893,
        -0.28401554296242809,
        0.00047248457399797254,
        0.12874742662018601,
        -0.017369301002022108,
        -0.044088253931064719,
        0.013981027917015516,
        0.0087460940470156547,
        -0.0048703529930106603,
        -0.00039174037299597711,
        0.00067544940599855677,
        -0.00011747678400228192,
    ],
    &[
        0.038077947363167282,
        0.24383467463766728,
        0.6048231236767786,
        0.65728807803663891,
        0.13319738582208895,
        -0.29327378327258685,
        -0.096840783220879037,
        0.14854074933476008,
        0.030725681478322865,
        -0.067632829059523988,
        0.00025094711499193845,
        0.022361662123515244,
        -0.004723204757894831,
        -0.0042815036819047227,
        0.0018476468829611268,
        0.00023038576399541288,
        -0.00025196318899817888,
        3.9347319995026124e-05,
    ],
    &[
        0.026670057900950818,
        0.18817680007762133,
        0.52720118893091983,
        0.68845903945259213,
        0.28117234366042648,
        -0.24984642432648865,
        -0.19594627437659665,
        0.12736934033574265,
        0.093057364603806592,
        -0.071394147165860775,
        -0.029457536821945671,
        0.033212674058933238,
        0.0036065535669883944,
        -0.010733175482979604,
        0.0013953517469940798,
        0.0019924052949908499,
        -0.00068585669500468248,
        -0.0001164668549943862,
        9.3588670001089845e-05,
        -1.3264203002354869e-05,
    ],
];

/// Supported Daubechies orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WaveletOrder {
    D2 = 2,
    D3 = 3,
    D4 = 4,
    D5 = 5,
    D6 = 6,
    D7 = 7,
    D8 = 8,
    D9 = 9,
    D10 = 10,
}

impl WaveletOrder {
    /// Get all orders, smallest support first.
    pub fn all() -> Vec<WaveletOrder> {
        vec![
            WaveletOrder::D2,
            WaveletOrder::D3,
            WaveletOrder::D4,
            WaveletOrder::D5,
            WaveletOrder::D6,
            WaveletOrder::D7,
            WaveletOrder::D8,
            WaveletOrder::D9,
            WaveletOrder::D10,
        ]
    }

    /// Factory over the supported orders; anything outside 2..=10 fails.
    pub fn from_order(order: usize) -> Result<Self> {
        match order {
            2 => Ok(WaveletOrder::D2),
            3 => Ok(WaveletOrder::D3),
            4 => Ok(WaveletOrder::D4),
            5 => Ok(WaveletOrder::D5),
            6 => Ok(WaveletOrder::D6),
            7 => Ok(WaveletOrder::D7),
            8 => Ok(WaveletOrder::D8),
            9 => Ok(WaveletOrder::D9),
            10 => Ok(WaveletOrder::D10),
            other => Err(Error::UnsupportedOrder(other)),
        }
    }

    /// The order N (half the filter length).
    pub fn support(&self) -> usize {
        *self as usize
    }

    /// Filter length 2N.
    pub fn filter_len(&self) -> usize {
        2 * self.support()
    }

    fn lowpass(&self) -> &'static [f64] {
        DAUBECHIES[self.support() - MIN_ORDER]
    }
}

impl TryFrom<usize> for WaveletOrder {
    type Error = Error;

    fn try_from(order: usize) -> Result<Self> {
        WaveletOrder::from_order(order)
    }
}

/// Immutable analysis/synthesis filters of one Daubechies wavelet.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    order: WaveletOrder,
    h: Vec<f64>,
    g: Vec<f64>,
    ih: Vec<f64>,
    ig: Vec<f64>,
}

impl FilterBank {
    /// Build the analysis and synthesis filters for `order`.
    pub fn new(order: WaveletOrder) -> Self {
        let h = order.lowpass().to_vec();
        let len = h.len();

        // Daubechies 3.17/3.45: g[i] = (-1)^i h[L-1-i]
        let g: Vec<f64> = (0..len)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                sign * h[len - 1 - i]
            })
            .collect();

        // Synthesis taps walk the (h, g) pairs backwards from index L-2:
        // Ih interleaves the even columns, Ig the odd ones.
        let mut ih = vec![0.0; len];
        let mut ig = vec![0.0; len];
        for (k, i) in (0..len).step_by(2).enumerate() {
            let z = len - 2 - 2 * k;
            ih[i] = h[z];
            ih[i + 1] = g[z];
            ig[i] = h[z + 1];
            ig[i + 1] = g[z + 1];
        }

        Self { order, h, g, ih, ig }
    }

    /// Build the bank for a numeric order, failing outside 2..=10.
    pub fn daubechies(order: usize) -> Result<Self> {
        Ok(Self::new(WaveletOrder::from_order(order)?))
    }

    /// Get the wavelet order.
    pub fn order(&self) -> WaveletOrder {
        self.order
    }

    /// Wavelet support N.
    pub fn support(&self) -> usize {
        self.order.support()
    }

    /// Filter length 2N.
    pub fn len(&self) -> usize {
        self.h.len()
    }

    /// Check if the bank has no taps.
    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }

    /// Analysis low-pass filter.
    pub fn h(&self) -> &[f64] {
        &self.h
    }

    /// Analysis high-pass filter.
    pub fn g(&self) -> &[f64] {
        &self.g
    }

    /// Synthesis filter producing even output samples.
    pub fn ih(&self) -> &[f64] {
        &self.ih
    }

    /// Synthesis filter producing odd output samples.
    pub fn ig(&self) -> &[f64] {
        &self.ig
    }

    /// Human-readable filter name.
    pub fn name(&self) -> String {
        format!("Daubechies {}", self.support())
    }

    /// Export H, G, Ih and Ig concatenated, in that order.
    pub fn coefficients(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(4 * self.len());
        out.extend_from_slice(&self.h);
        out.extend_from_slice(&self.g);
        out.extend_from_slice(&self.ih);
        out.extend_from_slice(&self.ig);
        out
    }
}
