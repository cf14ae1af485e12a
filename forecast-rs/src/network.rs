//! Single-hidden-layer perceptron backing the learned coefficient predictors.
//!
//! Activation is a flattened hyperbolic tangent, `tanh(x / 80)`, so raw
//! coefficient differences of moderate size stay in its linear region. Training
//! is plain single-sample backpropagation.
//!
//! # Persistence format
//!
//! All values little-endian:
//!
//! ```text
//! u64 input_size | u64 hidden_size | u64 output_size
//! hidden_size x (input_size x f64 weight, f64 bias)
//! output_size x (hidden_size x f64 weight, f64 bias)
//! ```

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use std::io::{Read, Write};

const ACTIVATION_SCALE: f64 = 80.0;

/// Keeps the inverse activation finite for saturated outputs.
const SATURATION: f64 = 1.0 - 1e-12;

/// Largest layer accepted when loading a model.
const MAX_LAYER: u64 = 1 << 16;

/// Forward activation.
pub fn activate(x: f64) -> f64 {
    (x / ACTIVATION_SCALE).tanh()
}

/// Inverse of [`activate`], clamped to the open interval (-1, 1).
pub fn deactivate(y: f64) -> f64 {
    ACTIVATION_SCALE * y.clamp(-SATURATION, SATURATION).atanh()
}

/// Fully connected input → hidden → output perceptron.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// Hidden weights, one row per hidden neuron.
    w1: Array2<f64>,
    b1: Array1<f64>,
    /// Output weights, one row per output neuron.
    w2: Array2<f64>,
    b2: Array1<f64>,
    learning_rate: f64,
}

impl Network {
    /// Randomly initialised network.
    ///
    /// Hidden weights and biases are drawn from U(-0.9, 0.9); output weights and
    /// biases from U(0.1, 0.9).
    pub fn new<R: Rng>(
        input: usize,
        hidden: usize,
        output: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Self {
        let w1 = Array2::from_shape_fn((hidden, input), |_| rng.gen_range(-0.9..0.9));
        let b1 = Array1::from_shape_fn(hidden, |_| rng.gen_range(-0.9..0.9));
        let w2 = Array2::from_shape_fn((output, hidden), |_| rng.gen_range(0.1..0.9));
        let b2 = Array1::from_shape_fn(output, |_| rng.gen_range(0.1..0.9));
        Self {
            w1,
            b1,
            w2,
            b2,
            learning_rate,
        }
    }

    /// Get the number of inputs.
    pub fn input_size(&self) -> usize {
        self.w1.ncols()
    }

    /// Get the number of hidden neurons.
    pub fn hidden_size(&self) -> usize {
        self.w1.nrows()
    }

    /// Get the number of outputs.
    pub fn output_size(&self) -> usize {
        self.w2.nrows()
    }

    /// Get the backpropagation step size.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Output-layer activations for `input`.
    pub fn forward(&self, input: &[f64]) -> Result<Array1<f64>> {
        let x = self.check_input(input)?;
        Ok(self.propagate(x).1)
    }

    /// One backpropagation step towards `target`.
    ///
    /// Returns the largest output error measured after the weights moved.
    pub fn train(&mut self, input: &[f64], target: &[f64]) -> Result<f64> {
        let x = self.check_input(input)?;
        if target.len() != self.output_size() {
            return Err(Error::WindowMismatch {
                expected: self.output_size(),
                actual: target.len(),
            });
        }
        let (hidden, output) = self.propagate(x);
        let error = &ArrayView1::from(target) - &output;
        let delta_out = &error * &output.mapv(|o| 1.0 - o * o);

        // Output layer first; the hidden deltas see the updated weights.
        let lr = self.learning_rate;
        self.w2.scaled_add(lr, &outer(&delta_out, &hidden));
        self.b2.scaled_add(lr, &delta_out);

        let back = self.w2.t().dot(&delta_out);
        let delta_hidden = &back * &hidden.mapv(|h| 1.0 - h * h);
        self.w1.scaled_add(lr, &outer(&delta_hidden, &x.to_owned()));
        self.b1.scaled_add(lr, &delta_hidden);

        let (_, output) = self.propagate(x);
        let residual = &ArrayView1::from(target) - &output;
        Ok(residual.iter().map(|e| e.abs()).fold(0.0, f64::max))
    }

    /// Serialize in the layout described in the module docs.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        for size in [self.input_size(), self.hidden_size(), self.output_size()] {
            writer.write_all(&(size as u64).to_le_bytes())?;
        }
        write_layer(writer, &self.w1, &self.b1)?;
        write_layer(writer, &self.w2, &self.b2)?;
        Ok(())
    }

    /// Read a network written by [`Network::save`].
    pub fn load<R: Read>(reader: &mut R, learning_rate: f64) -> Result<Self> {
        let input = read_size(reader)?;
        let hidden = read_size(reader)?;
        let output = read_size(reader)?;
        let (w1, b1) = read_layer(reader, hidden, input)?;
        let (w2, b2) = read_layer(reader, output, hidden)?;
        Ok(Self {
            w1,
            b1,
            w2,
            b2,
            learning_rate,
        })
    }

    fn check_input<'a>(&self, input: &'a [f64]) -> Result<ArrayView1<'a, f64>> {
        if input.len() != self.input_size() {
            return Err(Error::WindowMismatch {
                expected: self.input_size(),
                actual: input.len(),
            });
        }
        Ok(ArrayView1::from(input))
    }

    fn propagate(&self, x: ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
        let hidden = (self.w1.dot(&x) + &self.b1).mapv(activate);
        let output = (self.w2.dot(&hidden) + &self.b2).mapv(activate);
        (hidden, output)
    }
}

fn outer(column: &Array1<f64>, row: &Array1<f64>) -> Array2<f64> {
    let column = column.view().insert_axis(Axis(1));
    let row = row.view().insert_axis(Axis(0));
    column.dot(&row)
}

fn write_layer<W: Write>(writer: &mut W, weights: &Array2<f64>, bias: &Array1<f64>) -> Result<()> {
    for (neuron, b) in weights.outer_iter().zip(bias.iter()) {
        for w in neuron.iter() {
            writer.write_all(&w.to_le_bytes())?;
        }
        writer.write_all(&b.to_le_bytes())?;
    }
    Ok(())
}

fn read_size<R: Read>(reader: &mut R) -> Result<usize> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let size = u64::from_le_bytes(buf);
    if size == 0 || size > MAX_LAYER {
        return Err(Error::CorruptModel(format!("layer size {size} out of range")));
    }
    Ok(size as usize)
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let value = f64::from_le_bytes(buf);
    if !value.is_finite() {
        return Err(Error::CorruptModel(format!("non-finite parameter {value}")));
    }
    Ok(value)
}

fn read_layer<R: Read>(
    reader: &mut R,
    neurons: usize,
    inputs: usize,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let mut weights = Array2::zeros((neurons, inputs));
    let mut bias = Array1::zeros(neurons);
    for n in 0..neurons {
        for i in 0..inputs {
            weights[[n, i]] = read_f64(reader)?;
        }
        bias[n] = read_f64(reader)?;
    }
    Ok((weights, bias))
}
