//! Latency benchmarks for the transform and forecasting paths.
//!
//! # Benchmarks
//!
//! ## Transform
//! - `transform_full`: Full pyramidal forward transform
//! - `transform_reduced`: Forward transform reusing invariant coefficients
//! - `transform_invert`: Inverse transform
//!
//! ## Engine
//! - `engine_update`: Ingest one window (reduced path, warm history)
//! - `engine_update_and_predict`: Ingest one window and forecast
//!
//! # Running Benchmarks
//!
//! ```bash
//! # All benchmarks
//! cargo bench
//!
//! # Specific benchmark
//! cargo bench -- transform_reduced
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wavecast::{
    Engine, EngineConfig, History, ReducedTransform, ShiftVarianceTheorem, WaveletOrder,
    WaveletTransform,
};

fn series(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 + (i as f64 * 0.01).sin() * 2.0 + (i as f64 * 0.13).cos() * 0.3)
        .collect()
}

//
// Transform Benchmarks
//

fn benchmark_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    for window in [128usize, 512, 2048].iter() {
        let wt = WaveletTransform::daubechies(WaveletOrder::D4);
        let theorem = ShiftVarianceTheorem::for_transform(&wt, *window).unwrap();
        let reduced = ReducedTransform::new(&wt, &theorem).unwrap();

        let data = series(2 * window);
        let mut history = History::new(*window, *window);
        for t in 0..*window {
            history.push(wt.transform(&data[t..t + window]).unwrap());
        }
        let frame = &data[*window..2 * window];
        let crystal = wt.transform(frame).unwrap();

        group.bench_with_input(BenchmarkId::new("full", window), window, |b, _| {
            b.iter(|| wt.transform(black_box(frame)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("reduced", window), window, |b, _| {
            b.iter(|| reduced.reduce(black_box(frame), &history).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("invert", window), window, |b, _| {
            b.iter(|| wt.invert(black_box(&crystal)).unwrap());
        });
    }

    group.finish();
}

//
// Engine Benchmarks
//

fn warm_engine(window: usize, data: &[f64]) -> Engine {
    let mut engine = Engine::new(EngineConfig::with_window(2, window)).unwrap();
    for t in 0..window {
        engine.update(&data[t..t + window]).unwrap();
    }
    engine
}

fn benchmark_engine(c: &mut Criterion) {
    let window = 128;
    let data = series(512 * window);

    // Restart from a fresh warm engine when the series runs out, so every
    // measured update continues the previous window.
    c.bench_function("engine_update", |b| {
        let mut engine = warm_engine(window, &data);
        let mut t = window;
        b.iter(|| {
            if t + window > data.len() {
                engine = warm_engine(window, &data);
                t = window;
            }
            engine.update(black_box(&data[t..t + window])).unwrap();
            t += 1;
        });
    });

    c.bench_function("engine_update_and_predict", |b| {
        let mut engine = warm_engine(window, &data);
        let mut t = window;
        b.iter(|| {
            if t + window > data.len() {
                engine = warm_engine(window, &data);
                t = window;
            }
            engine.update(black_box(&data[t..t + window])).unwrap();
            black_box(engine.predict().unwrap());
            t += 1;
        });
    });
}

criterion_group!(benches, benchmark_transforms, benchmark_engine);
criterion_main!(benches);
