//! Regression backend contract and the built-in MLP backend

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use duet_core::{DuetError, DuetResult, FlatPose, FLAT_POSE_LEN};

use crate::{Mlp, ModelBounds};

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    /// Hidden layer widths between the 66D input and output
    pub hidden_layers: Vec<usize>,
    /// Passes over the whole dataset
    pub epochs: usize,
    /// Samples per optimizer step
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f32,
    /// Reshuffle batches every epoch
    pub shuffle_each_epoch: bool,
    /// Fixed seed for weight init and shuffling (random if unset)
    pub seed: Option<u64>,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 64, 32],
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            shuffle_each_epoch: true,
            seed: None,
        }
    }
}

impl Hyperparams {
    /// Small network and few epochs, for demos and tests
    pub fn quick() -> Self {
        Self {
            hidden_layers: vec![32, 16],
            epochs: 10,
            batch_size: 16,
            learning_rate: 0.005,
            shuffle_each_epoch: true,
            seed: None,
        }
    }

    /// Layer sizes including input and output
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(FLAT_POSE_LEN);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(FLAT_POSE_LEN);
        sizes
    }

    /// Copy with a different seed offset (for independent runs)
    pub fn with_seed_offset(&self, offset: u64) -> Self {
        let mut params = self.clone();
        params.seed = self.seed.map(|s| s.wrapping_add(offset));
        params
    }

    /// Random source for one run
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn validate(&self) -> DuetResult<()> {
        if self.epochs == 0 {
            return Err(DuetError::InvalidConfig("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(DuetError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(DuetError::InvalidConfig(
                "learning rate must be positive".into(),
            ));
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(DuetError::InvalidConfig(
                "hidden layers must be non-empty".into(),
            ));
        }
        Ok(())
    }
}

/// A fitted pose → pose function working on normalized values
pub trait Regressor: Send + Sync {
    fn predict(&self, input: &FlatPose) -> DuetResult<FlatPose>;
}

/// Something that can fit a regressor from normalized pose pairs
pub trait RegressionBackend: Send + Sync + 'static {
    type Model: Regressor + 'static;

    fn fit(
        &self,
        inputs: &[FlatPose],
        labels: &[FlatPose],
        params: &Hyperparams,
    ) -> DuetResult<Self::Model>;
}

impl Regressor for Mlp {
    fn predict(&self, input: &FlatPose) -> DuetResult<FlatPose> {
        FlatPose::from_slice(&self.forward(input.as_slice())?)
    }
}

/// Built-in backend: dense network, MSE loss, Adam
#[derive(Debug, Clone, Copy, Default)]
pub struct MlpBackend;

impl RegressionBackend for MlpBackend {
    type Model = Mlp;

    fn fit(
        &self,
        inputs: &[FlatPose],
        labels: &[FlatPose],
        params: &Hyperparams,
    ) -> DuetResult<Mlp> {
        params.validate()?;
        if inputs.len() != labels.len() {
            return Err(DuetError::DimensionMismatch {
                expected: inputs.len(),
                actual: labels.len(),
            });
        }
        if inputs.is_empty() {
            return Err(DuetError::EmptyDataset);
        }

        let mut rng = params.rng();
        let mut mlp = Mlp::new(&params.layer_sizes(), &mut rng)?;
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut last_loss = f32::NAN;

        for epoch in 0..params.epochs {
            if params.shuffle_each_epoch {
                order.shuffle(&mut rng);
            }

            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;
            for chunk in order.chunks(params.batch_size) {
                let batch_inputs: Vec<&[f32]> =
                    chunk.iter().map(|&i| inputs[i].as_slice()).collect();
                let batch_labels: Vec<&[f32]> =
                    chunk.iter().map(|&i| labels[i].as_slice()).collect();
                epoch_loss += mlp.train_batch(&batch_inputs, &batch_labels, params.learning_rate)?;
                batches += 1;
            }
            last_loss = epoch_loss / batches.max(1) as f32;

            if !last_loss.is_finite() {
                return Err(DuetError::TrainingFailed(format!(
                    "loss diverged at epoch {epoch}"
                )));
            }
            tracing::trace!(epoch, loss = last_loss, "epoch finished");
        }

        tracing::debug!(
            samples = inputs.len(),
            epochs = params.epochs,
            loss = last_loss,
            "network fitted"
        );
        Ok(mlp)
    }
}

/// A regressor together with the bounds it was trained with
pub struct TrainedModel {
    regressor: Box<dyn Regressor>,
    bounds: ModelBounds,
    samples: usize,
}

impl TrainedModel {
    pub fn new(regressor: Box<dyn Regressor>, bounds: ModelBounds, samples: usize) -> Self {
        Self {
            regressor,
            bounds,
            samples,
        }
    }

    /// Predict a raw pose from a raw pose, using the training-time bounds
    pub fn predict(&self, pose: &FlatPose) -> DuetResult<FlatPose> {
        let normalized = self.bounds.input.normalize(pose);
        let output = self.regressor.predict(&normalized)?;
        Ok(self.bounds.label.denormalize(&output))
    }

    pub fn bounds(&self) -> &ModelBounds {
        &self.bounds
    }

    /// Number of samples the model was trained on
    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedModel")
            .field("bounds", &self.bounds)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}
