//! Dense feed-forward network
//!
//! A plain multi-layer perceptron: ReLU hidden layers, a linear output layer,
//! mean squared error and the Adam optimizer. Weights are `[output, input]`
//! matrices and every pass works on a whole `[batch, features]` matrix.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::Rng;

use duet_core::{DuetError, DuetResult};

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;

/// Layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    #[inline]
    fn apply(self, z: f32) -> f32 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Linear => z,
        }
    }

    /// Derivative expressed through the activated value
    #[inline]
    fn derivative(self, activated: f32) -> f32 {
        match self {
            Activation::Relu => {
                if activated > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

/// Fully-connected layer with its optimizer state
#[derive(Debug, Clone)]
pub struct Dense {
    activation: Activation,
    weights: Array2<f32>,
    bias: Array1<f32>,
    grad_w: Array2<f32>,
    grad_b: Array1<f32>,
    m_w: Array2<f32>,
    v_w: Array2<f32>,
    m_b: Array1<f32>,
    v_b: Array1<f32>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> DuetResult<Self> {
        if input_dim == 0 || output_dim == 0 {
            return Err(DuetError::InvalidConfig(format!(
                "layer dimensions must be non-zero ({input_dim} -> {output_dim})"
            )));
        }

        let limit = (6.0 / (input_dim + output_dim) as f32).sqrt();
        let shape = (output_dim, input_dim);
        let weights = Array2::from_shape_fn(shape, |_| rng.gen_range(-limit..limit));

        Ok(Self {
            activation,
            weights,
            bias: Array1::zeros(output_dim),
            grad_w: Array2::zeros(shape),
            grad_b: Array1::zeros(output_dim),
            m_w: Array2::zeros(shape),
            v_w: Array2::zeros(shape),
            m_b: Array1::zeros(output_dim),
            v_b: Array1::zeros(output_dim),
        })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// `[batch, input]` to `[batch, output]`
    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let activation = self.activation;
        let mut out = input.dot(&self.weights.t()) + &self.bias;
        out.mapv_inplace(|z| activation.apply(z));
        out
    }

    /// Store the batch gradients; returns the gradient w.r.t. the input
    fn backward(
        &mut self,
        input: &Array2<f32>,
        output: &Array2<f32>,
        grad_output: &Array2<f32>,
    ) -> Array2<f32> {
        let activation = self.activation;
        let grad_z = grad_output * &output.mapv(|o| activation.derivative(o));
        self.grad_w = grad_z.t().dot(input);
        self.grad_b = grad_z.sum_axis(Axis(0));
        grad_z.dot(&self.weights)
    }

    fn adam_step(&mut self, learning_rate: f32, step: i32) {
        let corrections = (
            1.0 - ADAM_BETA1.powi(step),
            1.0 - ADAM_BETA2.powi(step),
        );
        adam_update(
            &mut self.weights,
            &self.grad_w,
            &mut self.m_w,
            &mut self.v_w,
            learning_rate,
            corrections,
        );
        adam_update(
            &mut self.bias,
            &self.grad_b,
            &mut self.m_b,
            &mut self.v_b,
            learning_rate,
            corrections,
        );
    }
}

fn adam_update<D: Dimension>(
    params: &mut Array<f32, D>,
    grads: &Array<f32, D>,
    m: &mut Array<f32, D>,
    v: &mut Array<f32, D>,
    learning_rate: f32,
    (correction1, correction2): (f32, f32),
) {
    Zip::from(params)
        .and(grads)
        .and(m)
        .and(v)
        .for_each(|param, &grad, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * grad;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * grad * grad;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *param -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        });
}

/// Stack equally sized rows into a `[rows, width]` matrix
fn stack_rows(rows: &[&[f32]], width: usize) -> DuetResult<Array2<f32>> {
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(DuetError::DimensionMismatch {
            expected: width,
            actual: row.len(),
        });
    }
    Array2::from_shape_vec((rows.len(), width), rows.concat()).map_err(|_| {
        DuetError::DimensionMismatch {
            expected: rows.len() * width,
            actual: rows.iter().map(|row| row.len()).sum(),
        }
    })
}

/// Multi-layer perceptron
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
    step: i32,
}

impl Mlp {
    /// Build a network from layer sizes, e.g. `[66, 128, 64, 32, 66]`.
    ///
    /// Every layer but the last uses ReLU; the last is linear.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> DuetResult<Self> {
        if sizes.len() < 2 {
            return Err(DuetError::InvalidConfig(
                "a network needs at least an input and an output size".to_string(),
            ));
        }

        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last {
                    Activation::Linear
                } else {
                    Activation::Relu
                };
                Dense::new(pair[0], pair[1], activation, rng)
            })
            .collect::<DuetResult<Vec<_>>>()?;

        Ok(Self { layers, step: 0 })
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(Dense::input_dim).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(Dense::output_dim).unwrap_or(0)
    }

    /// Run one input through the network
    pub fn forward(&self, input: &[f32]) -> DuetResult<Vec<f32>> {
        let batch = stack_rows(&[input], self.input_dim())?;
        Ok(self.forward_batch(batch).into_raw_vec())
    }

    fn forward_batch(&self, batch: Array2<f32>) -> Array2<f32> {
        self.layers
            .iter()
            .fold(batch, |activation, layer| layer.forward(&activation))
    }

    /// Every layer's output, preceded by the input itself
    fn forward_trace(&self, batch: Array2<f32>) -> Vec<Array2<f32>> {
        let mut trace = Vec::with_capacity(self.layers.len() + 1);
        trace.push(batch);
        for layer in &self.layers {
            let next = layer.forward(&trace[trace.len() - 1]);
            trace.push(next);
        }
        trace
    }

    /// One Adam step on a mini-batch; returns the batch's mean squared error
    pub fn train_batch(
        &mut self,
        inputs: &[&[f32]],
        targets: &[&[f32]],
        learning_rate: f32,
    ) -> DuetResult<f32> {
        if inputs.len() != targets.len() {
            return Err(DuetError::DimensionMismatch {
                expected: inputs.len(),
                actual: targets.len(),
            });
        }
        if inputs.is_empty() {
            return Err(DuetError::EmptyDataset);
        }

        let x = stack_rows(inputs, self.input_dim())?;
        let y = stack_rows(targets, self.output_dim())?;
        let loss = self.backpropagate(x, &y);

        self.step += 1;
        for layer in &mut self.layers {
            layer.adam_step(learning_rate, self.step);
        }

        Ok(loss)
    }

    /// Fill every layer's gradients of the batch MSE; returns that MSE
    fn backpropagate(&mut self, x: Array2<f32>, y: &Array2<f32>) -> f32 {
        let count = y.len() as f32;
        let trace = self.forward_trace(x);
        let diff = &trace[trace.len() - 1] - y;
        let squared_error = diff.mapv(|d| d * d).sum();

        let mut grad = diff * (2.0 / count);
        for (index, layer) in self.layers.iter_mut().enumerate().rev() {
            grad = layer.backward(&trace[index], &trace[index + 1], &grad);
        }
        squared_error / count
    }

    /// Mean squared error over a set of samples
    pub fn evaluate(&self, inputs: &[&[f32]], targets: &[&[f32]]) -> DuetResult<f32> {
        if inputs.len() != targets.len() {
            return Err(DuetError::DimensionMismatch {
                expected: inputs.len(),
                actual: targets.len(),
            });
        }
        if inputs.is_empty() {
            return Err(DuetError::EmptyDataset);
        }
        let x = stack_rows(inputs, self.input_dim())?;
        let y = stack_rows(targets, self.output_dim())?;
        let diff = self.forward_batch(x) - &y;
        Ok(diff.mapv(|d| d * d).mean().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_network_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let mlp = Mlp::new(&[66, 128, 64, 32, 66], &mut rng).unwrap();

        assert_eq!(mlp.layers().len(), 4);
        assert_eq!(mlp.input_dim(), 66);
        assert_eq!(mlp.output_dim(), 66);
        assert_eq!(mlp.layers()[0].activation(), Activation::Relu);
        assert_eq!(mlp.layers()[3].activation(), Activation::Linear);

        let out = mlp.forward(&[0.5; 66]).unwrap();
        assert_eq!(out.len(), 66);
    }

    #[test]
    fn test_forward_rejects_wrong_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let mlp = Mlp::new(&[4, 3, 2], &mut rng).unwrap();
        assert_eq!(
            mlp.forward(&[1.0, 2.0]),
            Err(DuetError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn test_invalid_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(Mlp::new(&[4], &mut rng).is_err());
        assert!(Mlp::new(&[4, 0, 2], &mut rng).is_err());
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mlp = Mlp::new(&[2, 8, 2], &mut rng).unwrap();

        // y = (x1, x0): a swap is learnable by a tiny network
        let data: Vec<([f32; 2], [f32; 2])> = (0..32)
            .map(|i| {
                let a = (i % 8) as f32 / 8.0;
                let b = (i / 8) as f32 / 4.0;
                ([a, b], [b, a])
            })
            .collect();
        let inputs: Vec<&[f32]> = data.iter().map(|(x, _)| x.as_slice()).collect();
        let targets: Vec<&[f32]> = data.iter().map(|(_, y)| y.as_slice()).collect();

        let before = mlp.evaluate(&inputs, &targets).unwrap();
        for _ in 0..300 {
            mlp.train_batch(&inputs, &targets, 0.01).unwrap();
        }
        let after = mlp.evaluate(&inputs, &targets).unwrap();

        assert!(after < before);
    }

    #[test]
    fn test_train_batch_validates_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut mlp = Mlp::new(&[2, 2], &mut rng).unwrap();
        let input = [0.0f32, 1.0];
        let bad_target = [0.0f32];
        assert!(mlp
            .train_batch(&[&input[..]], &[&bad_target[..]], 0.01)
            .is_err());
        assert_eq!(
            mlp.train_batch(&[], &[], 0.01),
            Err(DuetError::EmptyDataset)
        );
    }

    #[test]
    fn test_batch_forward_matches_single_rows() {
        let mut rng = StdRng::seed_from_u64(4);
        let mlp = Mlp::new(&[3, 5, 2], &mut rng).unwrap();
        let rows: [[f32; 3]; 3] = [[0.1, 0.2, 0.3], [0.9, 0.0, 0.5], [0.4, 0.4, 0.4]];
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();

        let batch = mlp.forward_batch(stack_rows(&refs, 3).unwrap());
        for (i, row) in rows.iter().enumerate() {
            let single = mlp.forward(row).unwrap();
            for (a, b) in single.iter().zip(batch.row(i)) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut mlp = Mlp::new(&[3, 4, 2], &mut rng).unwrap();
        let inputs: [[f32; 3]; 2] = [[0.2, 0.7, 0.1], [0.5, 0.3, 0.9]];
        let targets: [[f32; 2]; 2] = [[0.4, 0.1], [0.8, 0.6]];
        let x: Vec<&[f32]> = inputs.iter().map(|r| r.as_slice()).collect();
        let y: Vec<&[f32]> = targets.iter().map(|r| r.as_slice()).collect();

        mlp.backpropagate(stack_rows(&x, 3).unwrap(), &stack_rows(&y, 2).unwrap());

        let eps = 1e-3;
        for layer in 0..2 {
            let analytic = mlp.layers[layer].grad_w.clone();
            for ((o, i), &grad) in analytic.indexed_iter() {
                let mut plus = mlp.clone();
                plus.layers[layer].weights[[o, i]] += eps;
                let mut minus = mlp.clone();
                minus.layers[layer].weights[[o, i]] -= eps;
                let numeric =
                    (plus.evaluate(&x, &y).unwrap() - minus.evaluate(&x, &y).unwrap()) / (2.0 * eps);
                assert!(
                    (numeric - grad).abs() < 1e-2,
                    "layer {layer} [{o}, {i}]: numeric {numeric}, analytic {grad}"
                );
            }
        }
    }
}
