pub mod construction;
pub mod feed_forward;
mod persist;

pub use self::feed_forward::Workspace;

use crate::error::{Error, Result};
use crate::initializer::Init;
use crate::layers::{BasicLayer, LayerKind, Neuron};
use crate::tensor::Tensor;
use crate::trainer::{History, Logger, MockLogger, TrainingConfig, TrainingData, WorkerPool};

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// A chain of sigmoid layers together with everything needed to train it.
///
/// The input itself is not a layer: `layers[k]` maps activation `k` onto
/// activation `k + 1`, so a network over `neurons = [2, 3, 1]` holds two layers.
/// Until a topology is created the network is uninitialized and refuses to
/// train or predict.
#[derive(Debug)]
pub struct Network {
    pub(crate) neurons: Vec<usize>,
    pub(crate) layers: Vec<BasicLayer>,
    pub(crate) kind: LayerKind,
    pub(crate) init: Init,
    pub(crate) workspace: Option<Workspace>,
    pub(crate) config: TrainingConfig,
    pub(crate) history: History,
    pub(crate) rng: SmallRng,
    pub(crate) logger: Box<dyn Logger>,
    pub(crate) pool: Option<WorkerPool>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Network {
    /// Uninitialized network whose weight initialization and shuffling derive from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            neurons: Vec::new(),
            layers: Vec::new(),
            kind: LayerKind::default(),
            init: Init::default(),
            workspace: None,
            config: TrainingConfig::default(),
            history: History::default(),
            rng: SmallRng::seed_from_u64(seed),
            logger: Box::new(MockLogger),
            pool: None,
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.workspace.is_some()
    }

    /// Layer sizes, input first.
    pub fn neurons(&self) -> &[usize] {
        &self.neurons
    }

    pub fn layers(&self) -> &[BasicLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [BasicLayer] {
        &mut self.layers
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrainingConfig {
        &mut self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn set_logger<L: Logger + 'static>(&mut self, logger: L) {
        self.logger = Box::new(logger);
    }

    /// Used by the next topology creation.
    pub fn set_initializer(&mut self, init: Init) {
        self.init = init;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.config.rate = rate;
    }

    pub fn set_l2_const(&mut self, l2_const: f32) {
        self.config.l2_const = l2_const;
    }

    /// Panics on zero.
    pub fn set_minibatch(&mut self, minibatch: usize) {
        assert!(minibatch > 0, "Minibatch size must be positive");
        self.config.minibatch = minibatch;
    }

    pub fn set_training_iters(&mut self, iterations: usize) {
        self.config.iterations = iterations;
    }

    pub fn set_display(&mut self, display: bool) {
        self.config.display = display;
    }

    pub fn set_check_correct(&mut self, check_correct: bool) {
        self.config.check_correct = check_correct;
    }

    pub fn set_track_error(&mut self, track_error: bool) {
        self.config.track_error = track_error;
    }

    pub fn set_rate_decay(&mut self, factor: Option<f32>) {
        self.config.rate_decay = factor;
    }

    /// Panics on zero.
    pub fn set_threads(&mut self, threads: usize) {
        assert!(threads > 0, "Need at least one worker thread");
        self.config.threads = threads;
    }

    /// Runs `input` through the network and returns a copy of the output.
    pub fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.predict(input).map(Clone::clone)
    }

    /// Runs `input` through the network. The output stays valid until the next pass.
    pub fn predict(&mut self, input: &Tensor) -> Result<&Tensor> {
        let workspace = self.workspace.as_mut().ok_or(Error::Uninitialized)?;
        workspace.forward(&self.layers, input)?;
        Ok(workspace.output())
    }

    /// Fraction of samples whose largest output matches the largest target entry.
    pub fn evaluate_accuracy(&mut self, data: &dyn TrainingData) -> Result<f32> {
        let correct = self.count_correct(data)?;
        if data.is_empty() {
            return Ok(0.);
        }
        Ok(correct as f32 / data.len() as f32)
    }

    /// Mean summed squared error over `data`.
    pub fn cost(&mut self, data: &dyn TrainingData) -> Result<f32> {
        data.validate("data set")?;
        let workspace = self.workspace.as_mut().ok_or(Error::Uninitialized)?;
        let mut total = 0f64;
        for idx in 0..data.len() {
            let (input, target) = data.sample(idx);
            workspace.forward(&self.layers, input)?;
            total += workspace.cost(target)? as f64;
        }
        if data.is_empty() {
            return Ok(0.);
        }
        Ok((total / data.len() as f64) as f32)
    }

    pub(crate) fn count_correct(&mut self, data: &dyn TrainingData) -> Result<usize> {
        data.validate("data set")?;
        let workspace = self.workspace.as_mut().ok_or(Error::Uninitialized)?;
        let mut correct = 0;
        for idx in 0..data.len() {
            let (input, target) = data.sample(idx);
            workspace.forward(&self.layers, input)?;
            if workspace.is_correct(target)? {
                correct += 1;
            }
        }
        Ok(correct)
    }

    /// Number of weights and biases, tied tensors counted once per layer.
    pub fn parameter_count(&self) -> (usize, usize) {
        self.layers.iter().fold((0, 0), |(w, b), layer| {
            (
                w + layer.deltas().weights.shape().total(),
                b + layer.deltas().biases.shape().total(),
            )
        })
    }
}
