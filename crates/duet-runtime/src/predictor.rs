//! Live prediction with the mirrored model pair

use duet_core::{DuetResult, JointSet, PoseBatch};
use duet_model::ModelPair;

/// Which sides were refreshed on a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionUpdate {
    pub forward: bool,
    pub reverse: bool,
}

/// Holds the latest predicted pose of each model
#[derive(Debug, Default)]
pub struct Predictor {
    forward: Option<JointSet>,
    reverse: Option<JointSet>,
}

impl Predictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run both models on one detection batch.
    ///
    /// The forward model follows body 0. The reverse model follows body 1
    /// when two players are tracked and it is present, otherwise body 0. A
    /// side without input keeps its previous prediction.
    pub fn predict(
        &mut self,
        models: &ModelPair,
        batch: &PoseBatch,
        players: usize,
    ) -> DuetResult<PredictionUpdate> {
        let mut update = PredictionUpdate::default();

        if let Some(body) = batch.body(0) {
            let predicted = models.forward.predict(&body.flatten())?;
            self.forward = Some(predicted.unflatten());
            update.forward = true;
        }

        let reverse_input = if players == 2 {
            batch.body(1).or_else(|| batch.body(0))
        } else {
            batch.body(0)
        };
        if let Some(body) = reverse_input {
            let predicted = models.reverse.predict(&body.flatten())?;
            self.reverse = Some(predicted.unflatten());
            update.reverse = true;
        }

        tracing::trace!(
            forward = update.forward,
            reverse = update.reverse,
            "predictions updated"
        );
        Ok(update)
    }

    /// Forget all predictions
    pub fn clear(&mut self) {
        self.forward = None;
        self.reverse = None;
    }

    pub fn forward(&self) -> Option<&JointSet> {
        self.forward.as_ref()
    }

    pub fn reverse(&self) -> Option<&JointSet> {
        self.reverse.as_ref()
    }

    /// Predicted bodies in render order (AI 1, then AI 2)
    pub fn poses(&self) -> Vec<JointSet> {
        self.forward.iter().chain(self.reverse.iter()).copied().collect()
    }
}
