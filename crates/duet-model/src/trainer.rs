//! Mirrored trainer - two regressors from one capture
//!
//! Model A (forward) maps person 1 onto person 2, model B (reverse) maps
//! person 2 onto person 1. Both fits run concurrently on the blocking pool and
//! are joined before anything is returned.

use std::sync::Arc;
use std::time::Instant;

use duet_core::{DuetError, DuetResult, FlatPose};

use crate::{Dataset, Hyperparams, ModelBounds, RegressionBackend, TrainedModel};

/// Each buffer needs strictly more samples than this to train
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Seed offset of the backend's random stream, kept apart from the shuffle
/// stream and from the other direction's seed
pub const BACKEND_SEED_OFFSET: u64 = 0x9E37_79B9;

/// The two models of one training run
#[derive(Debug)]
pub struct ModelPair {
    /// Person 1 drives person 2's avatar
    pub forward: TrainedModel,
    /// Person 2 drives person 1's avatar
    pub reverse: TrainedModel,
}

/// Which direction a training run learns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

/// Fit one model on one dataset.
///
/// The dataset is shuffled once, bounds are taken over the whole shuffled
/// tensor, and the backend fits on the normalized poses.
pub fn fit_dataset<B: RegressionBackend>(
    backend: &B,
    mut dataset: Dataset,
    params: &Hyperparams,
) -> DuetResult<TrainedModel> {
    if dataset.is_empty() {
        return Err(DuetError::EmptyDataset);
    }

    let mut rng = params.rng();
    dataset.shuffle(&mut rng);

    let bounds = ModelBounds::from_dataset(&dataset)?;
    let inputs: Vec<FlatPose> = dataset.sources().map(|p| bounds.input.normalize(p)).collect();
    let labels: Vec<FlatPose> = dataset.targets().map(|p| bounds.label.normalize(p)).collect();

    let backend_params = params.with_seed_offset(BACKEND_SEED_OFFSET);
    let regressor = backend.fit(&inputs, &labels, &backend_params)?;
    Ok(TrainedModel::new(Box::new(regressor), bounds, dataset.len()))
}

/// Trains the forward and reverse models concurrently
pub struct MirroredTrainer<B> {
    backend: Arc<B>,
    params: Hyperparams,
    min_samples: usize,
}

impl<B> Clone for MirroredTrainer<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            params: self.params.clone(),
            min_samples: self.min_samples,
        }
    }
}

impl<B: RegressionBackend> MirroredTrainer<B> {
    pub fn new(backend: B, params: Hyperparams) -> Self {
        Self {
            backend: Arc::new(backend),
            params,
            min_samples: MIN_TRAINING_SAMPLES,
        }
    }

    /// Override the per-buffer sample threshold
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn params(&self) -> &Hyperparams {
        &self.params
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Check the sample threshold and align the buffers
    pub fn prepare(&self, buffer1: &[FlatPose], buffer2: &[FlatPose]) -> DuetResult<Dataset> {
        if buffer1.len() <= self.min_samples || buffer2.len() <= self.min_samples {
            return Err(DuetError::InsufficientData {
                person1: buffer1.len(),
                person2: buffer2.len(),
                required: self.min_samples,
            });
        }
        Ok(Dataset::align(buffer1, buffer2))
    }

    /// Train both models; fails as a whole if either run fails
    pub async fn train(&self, buffer1: &[FlatPose], buffer2: &[FlatPose]) -> DuetResult<ModelPair> {
        let dataset = self.prepare(buffer1, buffer2)?;
        let mirrored = dataset.mirrored();
        let started = Instant::now();

        tracing::info!(
            samples = dataset.len(),
            person1 = buffer1.len(),
            person2 = buffer2.len(),
            "training mirrored models"
        );

        let forward = self.run(Direction::Forward, dataset, self.params.with_seed_offset(0));
        let reverse = self.run(Direction::Reverse, mirrored, self.params.with_seed_offset(1));
        let (forward, reverse) = tokio::join!(forward, reverse);

        let pair = ModelPair {
            forward: forward?,
            reverse: reverse?,
        };

        tracing::info!(
            elapsed = ?started.elapsed(),
            samples = pair.forward.samples(),
            "mirrored models trained"
        );
        Ok(pair)
    }

    async fn run(
        &self,
        direction: Direction,
        dataset: Dataset,
        params: Hyperparams,
    ) -> DuetResult<TrainedModel> {
        let backend = Arc::clone(&self.backend);
        let result = tokio::task::spawn_blocking(move || fit_dataset(&*backend, dataset, &params))
            .await
            .map_err(|e| {
                DuetError::TrainingFailed(format!("{} run aborted: {}", direction.as_str(), e))
            })?;

        if let Err(ref e) = result {
            tracing::warn!(direction = direction.as_str(), error = %e, "training run failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MlpBackend, Regressor};
    use duet_core::FLAT_POSE_LEN;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buffer(len: usize, base: f32) -> Vec<FlatPose> {
        (0..len)
            .map(|i| {
                let mut pose = [0.0; FLAT_POSE_LEN];
                for (j, v) in pose.iter_mut().enumerate() {
                    *v = base + ((i + j) % 10) as f32 * 0.05;
                }
                FlatPose(pose)
            })
            .collect()
    }

    fn quick_params() -> Hyperparams {
        let mut params = Hyperparams::quick();
        params.epochs = 2;
        params.seed = Some(42);
        params
    }

    struct Constant(f32);

    impl Regressor for Constant {
        fn predict(&self, _input: &FlatPose) -> DuetResult<FlatPose> {
            Ok(FlatPose([self.0; FLAT_POSE_LEN]))
        }
    }

    /// Counts fits; optionally fails whichever run finishes second
    struct CountingBackend {
        fits: AtomicUsize,
        fail_second: bool,
    }

    impl CountingBackend {
        fn new(fail_second: bool) -> Self {
            Self {
                fits: AtomicUsize::new(0),
                fail_second,
            }
        }
    }

    impl RegressionBackend for CountingBackend {
        type Model = Constant;

        fn fit(
            &self,
            _inputs: &[FlatPose],
            _labels: &[FlatPose],
            _params: &Hyperparams,
        ) -> DuetResult<Constant> {
            let previous = self.fits.fetch_add(1, Ordering::SeqCst);
            if self.fail_second && previous == 1 {
                return Err(DuetError::TrainingFailed("backend exploded".into()));
            }
            Ok(Constant(0.5))
        }
    }

    #[tokio::test]
    async fn test_insufficient_data_trains_nothing() {
        let backend = CountingBackend::new(false);
        let trainer = MirroredTrainer::new(backend, quick_params());

        let result = trainer.train(&buffer(5, 0.0), &buffer(20, 0.5)).await;
        assert_eq!(
            result.err(),
            Some(DuetError::InsufficientData {
                person1: 5,
                person2: 20,
                required: MIN_TRAINING_SAMPLES
            })
        );
        assert_eq!(trainer.backend.fits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exactly_threshold_is_insufficient() {
        let trainer = MirroredTrainer::new(MlpBackend, quick_params());
        let result = trainer.train(&buffer(10, 0.0), &buffer(11, 0.0)).await;
        assert!(matches!(result, Err(DuetError::InsufficientData { .. })));
    }

    #[tokio::test]
    async fn test_both_runs_complete() {
        let backend = CountingBackend::new(false);
        let trainer = MirroredTrainer::new(backend, quick_params());

        let pair = trainer.train(&buffer(12, 0.0), &buffer(30, 0.5)).await.unwrap();
        assert_eq!(trainer.backend.fits.load(Ordering::SeqCst), 2);
        assert_eq!(pair.forward.samples(), 12);
        assert_eq!(pair.reverse.samples(), 12);
    }

    #[tokio::test]
    async fn test_failure_in_one_run_fails_whole_call() {
        let backend = CountingBackend::new(true);
        let trainer = MirroredTrainer::new(backend, quick_params());

        let result = trainer.train(&buffer(15, 0.0), &buffer(15, 0.5)).await;
        assert!(matches!(result, Err(DuetError::TrainingFailed(_))));
        // both runs were still joined
        assert_eq!(trainer.backend.fits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mirrored_bounds_swap() {
        let trainer = MirroredTrainer::new(MlpBackend, quick_params());
        let b1 = buffer(16, 0.0);
        let b2 = buffer(16, 2.0);

        let pair = trainer.train(&b1, &b2).await.unwrap();
        let fwd = pair.forward.bounds();
        let rev = pair.reverse.bounds();

        assert_eq!(fwd.input, rev.label);
        assert_eq!(fwd.label, rev.input);
        assert!(fwd.input.max < fwd.label.min);
    }

    #[tokio::test]
    async fn test_predictions_land_in_label_space() {
        let trainer = MirroredTrainer::new(MlpBackend, quick_params());
        let b1 = buffer(24, 0.0);
        let b2 = buffer(24, 0.3);

        let pair = trainer.train(&b1, &b2).await.unwrap();
        let predicted = pair.forward.predict(&b1[3]).unwrap();
        assert_eq!(predicted.as_slice().len(), FLAT_POSE_LEN);
        assert!(predicted.0.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fit_dataset_rejects_empty() {
        let result = fit_dataset(&MlpBackend, Dataset::default(), &quick_params());
        assert_eq!(result.err(), Some(DuetError::EmptyDataset));
    }

    /// Records the seed every fit receives
    #[derive(Default)]
    struct SeedRecorder {
        seeds: std::sync::Mutex<Vec<Option<u64>>>,
    }

    impl RegressionBackend for SeedRecorder {
        type Model = Constant;

        fn fit(
            &self,
            _inputs: &[FlatPose],
            _labels: &[FlatPose],
            params: &Hyperparams,
        ) -> DuetResult<Constant> {
            self.seeds.lock().unwrap().push(params.seed);
            Ok(Constant(0.0))
        }
    }

    #[test]
    fn test_backend_seed_differs_from_shuffle_seed() {
        let backend = SeedRecorder::default();
        let params = quick_params();
        let dataset = Dataset::align(&buffer(12, 0.0), &buffer(12, 0.5));

        fit_dataset(&backend, dataset, &params).unwrap();

        let seeds = backend.seeds.lock().unwrap().clone();
        assert_eq!(seeds, vec![Some(42 + BACKEND_SEED_OFFSET)]);
        assert_ne!(seeds[0], params.seed);
    }

    #[tokio::test]
    async fn test_all_random_streams_distinct() {
        let trainer = MirroredTrainer::new(SeedRecorder::default(), quick_params());
        trainer
            .train(&buffer(12, 0.0), &buffer(12, 0.5))
            .await
            .unwrap();

        let mut seeds = trainer.backend.seeds.lock().unwrap().clone();
        seeds.sort();
        // forward shuffle 42, reverse shuffle 43, neither reused by a fit
        assert_eq!(
            seeds,
            vec![Some(42 + BACKEND_SEED_OFFSET), Some(43 + BACKEND_SEED_OFFSET)]
        );
    }
}
