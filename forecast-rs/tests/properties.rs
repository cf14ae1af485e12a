//! Property-based tests for the transform, theorem and calibration.

use proptest::prelude::*;
use wavecast::calibration::{reconcile, CalibrationLine};
use wavecast::{History, ReducedTransform, ShiftVarianceTheorem, WaveletOrder, WaveletTransform};

/// An order together with a valid window for it.
fn arb_order_and_window(max_log: u32) -> impl Strategy<Value = (WaveletOrder, usize)> {
    (2usize..=10).prop_flat_map(move |order| {
        let min_log = (2 * order).next_power_of_two().trailing_zeros();
        (Just(order), min_log..=max_log.max(min_log))
            .prop_map(|(order, log)| (WaveletOrder::from_order(order).unwrap(), 1usize << log))
    })
}

fn arb_signal(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1000.0f64..1000.0, len)
}

proptest! {
    /// Inverting a forward transform restores the window.
    #[test]
    fn round_trip(
        (order, signal) in arb_order_and_window(8)
            .prop_flat_map(|(order, window)| (Just(order), arb_signal(window)))
    ) {
        let wt = WaveletTransform::daubechies(order);
        let crystal = wt.transform(&signal).unwrap();
        let restored = wt.invert(&crystal).unwrap();
        let scale = signal.iter().fold(1.0f64, |m, x| m.max(x.abs()));
        for (a, b) in signal.iter().zip(&restored) {
            prop_assert!((a - b).abs() <= 1e-9 * scale, "{} vs {}", a, b);
        }
    }

    /// The closed form 2N - 1 - floor((N - 1) / 2^(j - 1)) solves the recurrence.
    #[test]
    fn variant_count_closed_form((order, window) in arb_order_and_window(12)) {
        let n = order.support();
        let theorem = ShiftVarianceTheorem::new(window, n).unwrap();
        for j in 1..=theorem.max_scale() {
            let expected = 2 * n - 1 - (n - 1) / (1 << (j - 1));
            prop_assert_eq!(theorem.variant_count(j), Some(expected));
        }
        prop_assert_eq!(
            theorem.invariant_ordinals().len() + theorem.variant_ordinals().len(),
            window
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The reduced transform reproduces the full transform exactly.
    #[test]
    fn reduced_equals_full(
        (order, window, series) in arb_order_and_window(7).prop_flat_map(|(order, window)| {
            (Just(order), Just(window), arb_signal(2 * window + 8))
        })
    ) {
        let wt = WaveletTransform::daubechies(order);
        let theorem = ShiftVarianceTheorem::for_transform(&wt, window).unwrap();
        let reduced = ReducedTransform::new(&wt, &theorem).unwrap();
        let mut history = History::new(window, window);

        for t in 0..=(series.len() - window) {
            let frame = &series[t..t + window];
            let full = wt.transform(frame).unwrap();
            if history.len() >= reduced.required_history() {
                prop_assert_eq!(reduced.reduce(frame, &history).unwrap(), full.clone());
            }
            history.push(full);
            prop_assert!(history.len() <= window);
        }
    }

    /// Predictions that already agree on one shift survive calibration.
    #[test]
    fn consistent_predictions_unchanged(
        shift in -1.9f64..1.9,
        lines in prop::collection::vec((0.05f64..3.0, any::<bool>(), -10.0f64..10.0), 1..32)
    ) {
        let lines: Vec<CalibrationLine> = lines
            .into_iter()
            .enumerate()
            .map(|(ordinal, (magnitude, negative, intercept))| CalibrationLine {
                ordinal,
                slope: if negative { -magnitude } else { magnitude },
                intercept,
                pinned: false,
            })
            .collect();
        let predicted: Vec<f64> = lines.iter().map(|l| l.apply(shift)).collect();

        let calibrated = reconcile(&lines, &predicted, 2.0).unwrap();
        prop_assert!((calibrated.shift - shift).abs() < 1e-9);
        for (a, b) in calibrated.crystal.iter().zip(&predicted) {
            prop_assert!((a - b).abs() < 1e-8);
        }
    }
}
