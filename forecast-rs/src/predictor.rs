//! Per-coefficient predictors.
//!
//! Every ordinal of the next crystal has one predictor. Ordinals the
//! shift-variance theorem classifies as invariant are copied from history;
//! the rest are forecast by a small network over the ordinal's own first
//! differences.

use crate::buffer::{Crystal, History};
use crate::config::LearnedConfig;
use crate::error::{Error, Result};
use crate::network::{activate, deactivate, Network};
use crate::theorem::ShiftVarianceTheorem;
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Capability shared by every coefficient predictor.
pub trait CoefficientPredictor {
    /// Ordinal of the crystal coefficient this predictor forecasts.
    fn ordinal(&self) -> usize;

    /// History rows required by `predict` and `update`.
    fn min_history(&self) -> usize;

    /// Forecast the coefficient of the crystal following the newest history row.
    ///
    /// Must not change any internal state.
    fn predict(&self, history: &History) -> Result<f64>;

    /// Adapt to the newest history row.
    fn update(&mut self, history: &History) -> Result<()>;

    fn ensure_history(&self, history: &History) -> Result<()> {
        let required = self.min_history();
        if history.len() < required {
            return Err(Error::insufficient_history(required, history.len()));
        }
        Ok(())
    }
}

/// Copies an invariant coefficient from the row `back_steps` positions back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TheoremPredictor {
    ordinal: usize,
    back_steps: usize,
}

impl TheoremPredictor {
    /// Predictor for `ordinal` reading the row `back_steps` back.
    pub fn new(ordinal: usize, back_steps: usize) -> Self {
        Self {
            ordinal,
            back_steps,
        }
    }

    /// Get the history lag.
    pub fn back_steps(&self) -> usize {
        self.back_steps
    }
}

impl CoefficientPredictor for TheoremPredictor {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn min_history(&self) -> usize {
        self.back_steps
    }

    fn predict(&self, history: &History) -> Result<f64> {
        let row = history
            .back(self.back_steps)
            .ok_or_else(|| Error::insufficient_history(self.back_steps, history.len()))?;
        // The coefficient slid one slot down since that row was produced.
        Ok(row[self.ordinal + 1])
    }

    fn update(&mut self, history: &History) -> Result<()> {
        self.ensure_history(history)
    }
}

/// Network-backed predictor for a variant ordinal.
#[derive(Debug, Clone)]
pub struct LearnedPredictor {
    ordinal: usize,
    network: Network,
    config: LearnedConfig,
}

impl LearnedPredictor {
    /// Predictor for `ordinal` with a freshly initialised network.
    pub fn new<R: Rng>(ordinal: usize, config: &LearnedConfig, rng: &mut R) -> Self {
        let network = Network::new(
            config.input_size,
            config.hidden_size,
            1,
            config.learning_rate,
            rng,
        );
        Self {
            ordinal,
            network,
            config: config.clone(),
        }
    }

    /// Get the backing network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Replace the network, keeping the configured layer sizes.
    pub fn set_network(&mut self, network: Network) -> Result<()> {
        if network.input_size() != self.config.input_size || network.output_size() != 1 {
            return Err(Error::CorruptModel(format!(
                "ordinal {}: expected a {}-input single-output network, found {}x{}x{}",
                self.ordinal,
                self.config.input_size,
                network.input_size(),
                network.hidden_size(),
                network.output_size()
            )));
        }
        self.network = network;
        Ok(())
    }

    /// First differences of this ordinal over the `input_size + 1` rows ending at `end`.
    fn differences(&self, history: &History, end: usize) -> Result<Vec<f64>> {
        let start = end
            .checked_sub(self.config.input_size)
            .ok_or_else(|| Error::insufficient_history(self.min_history(), history.len()))?;
        (start..end)
            .map(|i| -> Result<f64> {
                Ok(self.value(history, i + 1)? - self.value(history, i)?)
            })
            .collect()
    }

    fn value(&self, history: &History, row: usize) -> Result<f64> {
        let crystal = history
            .row(row)
            .ok_or_else(|| Error::insufficient_history(row + 1, history.len()))?;
        crystal.get(self.ordinal).copied().ok_or(Error::Range {
            ordinal: self.ordinal,
            window: crystal.len(),
        })
    }

    /// Retrain on one sample until the error after a step falls below `min_error`.
    ///
    /// Returns the number of backpropagation steps taken.
    fn retrain(&mut self, input: &[f64], target: f64) -> Result<usize> {
        let mut epochs = 0;
        while epochs < self.config.max_epochs {
            let error = self.network.train(input, &[target])?;
            epochs += 1;
            if error < self.config.min_error {
                break;
            }
        }
        Ok(epochs)
    }
}

impl CoefficientPredictor for LearnedPredictor {
    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn min_history(&self) -> usize {
        self.config.min_history()
    }

    fn predict(&self, history: &History) -> Result<f64> {
        self.ensure_history(history)?;
        let newest = history.len() - 1;
        let input = self.differences(history, newest)?;
        let output = self.network.forward(&input)?;
        Ok(deactivate(output[0]) + self.value(history, newest)?)
    }

    fn update(&mut self, history: &History) -> Result<()> {
        self.ensure_history(history)?;
        // Score the step that produced the newest row.
        let newest = history.len() - 1;
        let input = self.differences(history, newest - 1)?;
        let target = activate(self.value(history, newest)? - self.value(history, newest - 1)?);
        let output = self.network.forward(&input)?;
        let error = (target - output[0]).abs();
        if error > self.config.max_error {
            let epochs = self.retrain(&input, target)?;
            debug!(ordinal = self.ordinal, error, epochs, "retrained coefficient network");
        }
        Ok(())
    }
}

/// Tagged predictor stored by the bank.
#[derive(Debug, Clone)]
pub enum Predictor {
    Theorem(TheoremPredictor),
    Learned(Box<LearnedPredictor>),
}

impl Predictor {
    /// Check if this ordinal is copied from history.
    pub fn is_theorem(&self) -> bool {
        matches!(self, Predictor::Theorem(_))
    }

    /// Get the learned predictor, if any.
    pub fn as_learned(&self) -> Option<&LearnedPredictor> {
        match self {
            Predictor::Learned(learned) => Some(learned.as_ref()),
            Predictor::Theorem(_) => None,
        }
    }
}

impl CoefficientPredictor for Predictor {
    fn ordinal(&self) -> usize {
        match self {
            Predictor::Theorem(p) => p.ordinal(),
            Predictor::Learned(p) => p.ordinal(),
        }
    }

    fn min_history(&self) -> usize {
        match self {
            Predictor::Theorem(p) => p.min_history(),
            Predictor::Learned(p) => p.min_history(),
        }
    }

    fn predict(&self, history: &History) -> Result<f64> {
        match self {
            Predictor::Theorem(p) => p.predict(history),
            Predictor::Learned(p) => p.predict(history),
        }
    }

    fn update(&mut self, history: &History) -> Result<()> {
        match self {
            Predictor::Theorem(p) => p.update(history),
            Predictor::Learned(p) => p.update(history),
        }
    }
}

/// One predictor per crystal ordinal, indexed by ordinal.
#[derive(Debug, Clone)]
pub struct PredictorBank {
    predictors: Vec<Predictor>,
    min_history: usize,
    learning_rate: f64,
}

impl PredictorBank {
    /// Partition `0..window` into theorem-copy and learned predictors.
    pub fn new<R: Rng>(
        theorem: &ShiftVarianceTheorem,
        config: &LearnedConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let mut predictors = Vec::with_capacity(theorem.window());
        for ordinal in 0..theorem.window() {
            let predictor = if theorem.is_invariant(ordinal) {
                Predictor::Theorem(TheoremPredictor::new(ordinal, theorem.back_steps(ordinal)?))
            } else {
                Predictor::Learned(Box::new(LearnedPredictor::new(ordinal, config, rng)))
            };
            predictors.push(predictor);
        }
        let min_history = predictors
            .iter()
            .map(CoefficientPredictor::min_history)
            .max()
            .unwrap_or(0);

        Ok(Self {
            predictors,
            min_history,
            learning_rate: config.learning_rate,
        })
    }

    /// Get the number of predictors.
    pub fn len(&self) -> usize {
        self.predictors.len()
    }

    /// Check if the bank has no predictors.
    pub fn is_empty(&self) -> bool {
        self.predictors.is_empty()
    }

    /// Predictor for `ordinal`.
    pub fn get(&self, ordinal: usize) -> Option<&Predictor> {
        self.predictors.get(ordinal)
    }

    /// Iterate predictors in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &Predictor> {
        self.predictors.iter()
    }

    /// Deepest history any predictor in the bank needs.
    pub fn min_history(&self) -> usize {
        self.min_history
    }

    /// Number of theorem-copy predictors.
    pub fn theorem_count(&self) -> usize {
        self.predictors.iter().filter(|p| p.is_theorem()).count()
    }

    /// Number of learned predictors.
    pub fn learned_count(&self) -> usize {
        self.len() - self.theorem_count()
    }

    /// Ordinals handled by learned predictors, ascending.
    pub fn learned_ordinals(&self) -> Vec<usize> {
        self.predictors
            .iter()
            .filter(|p| !p.is_theorem())
            .map(CoefficientPredictor::ordinal)
            .collect()
    }

    /// Forecast the whole next crystal.
    pub fn predict_crystal(&self, history: &History) -> Result<Crystal> {
        if history.len() < self.min_history {
            return Err(Error::insufficient_history(self.min_history, history.len()));
        }
        self.predictors.iter().map(|p| p.predict(history)).collect()
    }

    /// Update every predictor with the newest history row.
    pub fn update(&mut self, history: &History) -> Result<()> {
        if history.len() < self.min_history {
            return Err(Error::insufficient_history(self.min_history, history.len()));
        }
        for predictor in &mut self.predictors {
            predictor.update(history)?;
        }
        Ok(())
    }

    /// Write every learned network, in ordinal order.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        for learned in self.predictors.iter().filter_map(Predictor::as_learned) {
            learned.network().save(writer)?;
        }
        Ok(())
    }

    /// Replace the learned networks with ones written by [`PredictorBank::save`].
    ///
    /// On failure the bank is left unchanged.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut networks = Vec::with_capacity(self.learned_count());
        for _ in 0..self.learned_count() {
            networks.push(Network::load(reader, self.learning_rate)?);
        }
        let mut staged = self.predictors.clone();
        let learned = staged.iter_mut().filter_map(|p| match p {
            Predictor::Learned(learned) => Some(learned),
            Predictor::Theorem(_) => None,
        });
        for (predictor, network) in learned.zip(networks) {
            predictor.set_network(network)?;
        }
        self.predictors = staged;
        Ok(())
    }

    /// Write every learned network to `path`.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load learned networks from `path`.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        self.load(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::WaveletOrder;
    use crate::transform::WaveletTransform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sliding_history(window: usize, rows: usize) -> (History, Vec<f64>) {
        let wt = WaveletTransform::daubechies(WaveletOrder::D2);
        let data: Vec<f64> = (0..window + rows)
            .map(|t| (t as f64 * 0.11).sin())
            .collect();
        let mut history = History::new(window, window);
        for t in 0..rows {
            history.push(wt.transform(&data[t..t + window]).unwrap());
        }
        (history, data)
    }

    fn bank(window: usize) -> PredictorBank {
        let theorem = ShiftVarianceTheorem::new(window, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        PredictorBank::new(&theorem, &LearnedConfig::default(), &mut rng).unwrap()
    }

    #[test]
    fn test_bank_partition() {
        let bank = bank(128);
        assert_eq!(bank.len(), 128);
        assert_eq!(bank.learned_count(), 18);
        assert_eq!(bank.theorem_count(), 110);
        assert_eq!(bank.learned_ordinals()[..5], [0, 1, 2, 3, 5]);
        // 32 back-steps for the coarsest theorem scale beat the learned lag of 10.
        assert_eq!(bank.min_history(), 32);
        assert!(bank.get(100).unwrap().is_theorem());
        assert!(!bank.get(127).unwrap().is_theorem());
    }

    #[test]
    fn test_theorem_predictor_recovers_next_crystal() {
        let window = 64;
        let (history, data) = sliding_history(window, 40);
        let theorem = ShiftVarianceTheorem::new(window, 2).unwrap();
        let wt = WaveletTransform::daubechies(WaveletOrder::D2);
        let next = wt.transform(&data[40..40 + window]).unwrap();

        for ordinal in theorem.invariant_ordinals() {
            let predictor = TheoremPredictor::new(ordinal, theorem.back_steps(ordinal).unwrap());
            assert_eq!(predictor.predict(&history).unwrap(), next[ordinal], "ordinal {ordinal}");
        }
    }

    #[test]
    fn test_theorem_predictor_needs_back_steps() {
        let (history, _) = sliding_history(64, 3);
        let mut predictor = TheoremPredictor::new(40, 4);
        assert!(predictor.predict(&history).unwrap_err().is_insufficient_history());
        assert!(predictor.update(&history).is_err());
    }

    #[test]
    fn test_learned_predict_is_pure() {
        let (history, _) = sliding_history(64, 20);
        let mut rng = StdRng::seed_from_u64(1);
        let predictor = LearnedPredictor::new(63, &LearnedConfig::default(), &mut rng);
        let first = predictor.predict(&history).unwrap();
        let second = predictor.predict(&history).unwrap();
        assert_eq!(first, second);
        assert!(first.is_finite());
    }

    #[test]
    fn test_learned_update_requires_history() {
        let (history, _) = sliding_history(64, 9);
        let mut rng = StdRng::seed_from_u64(1);
        let mut predictor = LearnedPredictor::new(63, &LearnedConfig::default(), &mut rng);
        let err = predictor.update(&history).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientHistory {
                required: 10,
                available: 9
            }
        ));
    }

    #[test]
    fn test_learned_update_retrains_on_large_error() {
        let config = LearnedConfig {
            max_error: 0.0,
            max_epochs: 4,
            ..LearnedConfig::default()
        };
        let (history, _) = sliding_history(64, 20);
        let mut rng = StdRng::seed_from_u64(9);
        let mut predictor = LearnedPredictor::new(62, &config, &mut rng);
        let before = predictor.network().clone();
        predictor.update(&history).unwrap();
        assert_ne!(predictor.network(), &before);
    }

    #[test]
    fn test_retrain_stops_once_error_is_met() {
        let config = LearnedConfig {
            min_error: 1.0,
            ..LearnedConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut predictor = LearnedPredictor::new(10, &config, &mut rng);
        let input = vec![0.01; config.input_size];
        assert_eq!(predictor.retrain(&input, activate(0.5)).unwrap(), 1);
    }

    #[test]
    fn test_missing_rows_are_errors() {
        let (history, _) = sliding_history(64, 5);
        let mut rng = StdRng::seed_from_u64(1);
        let predictor = LearnedPredictor::new(63, &LearnedConfig::default(), &mut rng);
        assert!(matches!(
            predictor.value(&history, 5),
            Err(Error::InsufficientHistory {
                required: 6,
                available: 5
            })
        ));
        assert!(predictor.differences(&history, 4).unwrap_err().is_insufficient_history());
        assert_eq!(predictor.value(&history, 4).unwrap(), history.newest().unwrap()[63]);
    }

    #[test]
    fn test_bank_predict_requires_history() {
        let bank = bank(128);
        let history = History::new(128, 128);
        assert!(bank.predict_crystal(&history).unwrap_err().is_insufficient_history());
    }

    #[test]
    fn test_bank_save_load() {
        let source = bank(64);
        let mut bytes = Vec::new();
        source.save(&mut bytes).unwrap();

        let theorem = ShiftVarianceTheorem::new(64, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(1234);
        let mut target = PredictorBank::new(&theorem, &LearnedConfig::default(), &mut rng).unwrap();
        target.load(&mut bytes.as_slice()).unwrap();

        for (a, b) in source.iter().zip(target.iter()) {
            if let (Some(a), Some(b)) = (a.as_learned(), b.as_learned()) {
                assert_eq!(a.network(), b.network());
            }
        }
    }

    #[test]
    fn test_bank_load_truncated_leaves_bank_untouched() {
        let source = bank(64);
        let mut bytes = Vec::new();
        source.save(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);

        let mut target = bank(64);
        let before: Vec<Network> = target
            .iter()
            .filter_map(Predictor::as_learned)
            .map(|p| p.network().clone())
            .collect();
        assert!(target.load(&mut bytes.as_slice()).is_err());
        let after: Vec<Network> = target
            .iter()
            .filter_map(Predictor::as_learned)
            .map(|p| p.network().clone())
            .collect();
        assert_eq!(before, after);
    }
}
