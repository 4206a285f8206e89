mod distributed;
mod logger;
mod pool;
mod processor;
mod stochaistic;

pub use self::distributed::{Communicator, LocalCluster, LocalComm};
pub use self::logger::{IterationRecord, LogFile, Logger, MockLogger};
pub use self::processor::{AutoEncode, Dataset, Tally, TrainingData};
pub use self::stochaistic::{Partition, Processor};

pub(crate) use self::pool::WorkerPool;

use self::processor::{Apply, GenericProcessor};
use self::stochaistic::Stochaistic;
use crate::error::{Error, Result};
use crate::helpers::sample_order;
use crate::layers::Neuron;
use crate::network::Network;
use crate::storage::Deltas;

use anyhow::Context;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Hyperparameters and bookkeeping switches of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub rate: f32,
    /// L2 regularisation constant. The effective factor is `l2_const * rate`.
    pub l2_const: f32,
    pub minibatch: usize,
    pub iterations: usize,
    /// Train on the first `subset` samples only.
    pub subset: Option<usize>,
    pub shuffle: bool,
    /// Count argmax hits on the training set.
    pub check_correct: bool,
    /// Sum the squared error on the training set.
    pub track_error: bool,
    /// Log a summary after every iteration.
    pub display: bool,
    /// Multiply the rate by this factor whenever the test accuracy fails to improve.
    pub rate_decay: Option<f32>,
    /// Size of the worker pool used by [`Network::train_concurrent`].
    pub threads: usize,
    pub save_every: Option<usize>,
    pub save_path: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            rate: 0.01,
            l2_const: 0.,
            minibatch: 10,
            iterations: 100,
            subset: None,
            shuffle: true,
            check_correct: true,
            track_error: true,
            display: false,
            rate_decay: None,
            threads: 4,
            save_every: None,
            save_path: PathBuf::from("backup.net"),
        }
    }
}

impl TrainingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&s)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}

/// Per iteration measurements of every training run since the topology was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub cost: Vec<f32>,
    pub train_accuracy: Vec<f32>,
    pub test_accuracy: Vec<f32>,
    pub seconds: Vec<f64>,
}

impl History {
    pub fn push(&mut self, record: &IterationRecord) {
        self.cost.extend(record.cost);
        self.train_accuracy.extend(record.train_accuracy);
        self.test_accuracy.extend(record.test_accuracy);
        self.seconds.push(record.seconds);
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        fs::write(path, serde_json::to_string(self)?)
            .with_context(|| format!("Failed to save history to {}", path.display()))?;
        Ok(())
    }
}

impl Network {
    /// Stochastic minibatch gradient descent over `data`, single threaded.
    ///
    /// Both data sets are validated before anything is touched. Empty training
    /// data is not an error, the call just returns.
    pub fn train(&mut self, data: &dyn TrainingData, test: Option<&dyn TrainingData>) -> Result<()> {
        let n = match self.prepare(data, test)? {
            Some(n) => n,
            None => return Ok(()),
        };
        let deltas: Vec<Deltas> = self.layers.iter().map(|l| l.deltas().clone()).collect();

        for iteration in 0..self.config.iterations {
            let started = Instant::now();
            let order = self.order(n);
            let workspace = self.workspace.as_mut().ok_or(Error::Uninitialized)?;
            let mut processor = GenericProcessor::new(
                &self.layers,
                workspace,
                &deltas,
                data,
                self.config.check_correct,
                self.config.track_error,
                Apply::Local,
            );
            Stochaistic::new(&order, self.config.minibatch, self.config.rate)
                .run(&mut processor)?;
            let tally = processor.tally;
            self.finish_iteration(iteration, tally, n, started, test, true)?;
        }
        Ok(())
    }

    /// Trains the network to reproduce its inputs, targets are ignored.
    pub fn train_auto_encoder(&mut self, data: &dyn TrainingData) -> Result<()> {
        self.train(&AutoEncode(data), None)
    }

    /// Checks the preconditions and readies the layers for a run.
    /// Returns the number of samples to train on, `None` when there are none.
    pub(crate) fn prepare(
        &mut self,
        data: &dyn TrainingData,
        test: Option<&dyn TrainingData>,
    ) -> Result<Option<usize>> {
        data.validate("training set")?;
        if let Some(test) = test {
            test.validate("test set")?;
        }
        if !self.is_initialized() {
            return Err(Error::Uninitialized);
        }
        if self.config.minibatch == 0 {
            return Err(Error::Config("the minibatch size must be positive".into()));
        }
        let n = self.config.subset.map_or(data.len(), |s| s.min(data.len()));
        if n == 0 {
            warn!("No training samples, skipping training");
            return Ok(None);
        }

        self.apply_l2_factor();
        let (weights, biases) = self.parameter_count();
        info!(
            samples = n,
            weights,
            biases,
            iterations = self.config.iterations,
            minibatch = self.config.minibatch,
            rate = self.config.rate,
            "Training network"
        );
        Ok(Some(n))
    }

    fn apply_l2_factor(&mut self) {
        let l2_factor = self.config.l2_const * self.config.rate;
        self.layers
            .iter_mut()
            .for_each(|l| l.set_l2_factor(l2_factor));
    }

    pub(crate) fn order(&mut self, n: usize) -> Vec<usize> {
        if self.config.shuffle {
            sample_order(n, Some(&mut self.rng))
        } else {
            sample_order::<SmallRng>(n, None)
        }
    }

    /// Test evaluation, rate decay, history, logging and the periodic save.
    pub(crate) fn finish_iteration(
        &mut self,
        iteration: usize,
        tally: Tally,
        n: usize,
        started: Instant,
        test: Option<&dyn TrainingData>,
        may_save: bool,
    ) -> Result<()> {
        let test_accuracy = match test {
            Some(test) => Some(self.evaluate_accuracy(test)?),
            None => None,
        };
        if let (Some(factor), Some(accuracy)) = (self.config.rate_decay, test_accuracy) {
            if let Some(&previous) = self.history.test_accuracy.last() {
                if accuracy <= previous {
                    self.config.rate *= factor;
                    self.apply_l2_factor();
                    info!(rate = self.config.rate, "Test accuracy stalled, decaying rate");
                }
            }
        }

        let record = IterationRecord {
            iteration,
            cost: Some((tally.error / n as f64) as f32).filter(|_| self.config.track_error),
            train_accuracy: Some(tally.correct as f32 / n as f32)
                .filter(|_| self.config.check_correct),
            test_accuracy,
            rate: self.config.rate,
            seconds: started.elapsed().as_secs_f64(),
        };
        self.history.push(&record);
        self.logger.iteration(&record);
        if self.config.display {
            info!(
                iteration,
                cost = ?record.cost,
                train_accuracy = ?record.train_accuracy,
                test_accuracy = ?record.test_accuracy,
                seconds = record.seconds,
                "Iteration done"
            );
        }

        if let Some(every) = self.config.save_every {
            if may_save && every > 0 && (iteration + 1) % every == 0 {
                if let Err(e) = self.save_network(&self.config.save_path) {
                    warn!(error = ?e, "Periodic save failed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerKind;
    use crate::tensor::Tensor;

    fn toy() -> Dataset {
        let a = Tensor::column(&[1., 0.]);
        let b = Tensor::column(&[0., 1.]);
        let mut data = Dataset::default();
        for _ in 0..20 {
            data.inputs.push(a.clone());
            data.targets.push(a.clone());
            data.inputs.push(b.clone());
            data.targets.push(b.clone());
        }
        data
    }

    fn weights(net: &Network) -> Vec<Vec<f32>> {
        net.layers()
            .iter()
            .map(|l| l.tensor(0).unwrap().read().data().to_vec())
            .collect()
    }

    #[test]
    fn preconditions_are_checked_in_order() {
        let mut net = Network::new(0);
        let x = Tensor::column(&[1., 0.]);
        let bad = Dataset::new(vec![x.clone()], vec![]);
        let good = Dataset::new(vec![x.clone()], vec![x]);

        assert!(matches!(
            net.train(&bad, Some(&bad)),
            Err(Error::DataMismatch { what: "training set", .. })
        ));
        assert!(matches!(
            net.train(&good, Some(&bad)),
            Err(Error::DataMismatch { what: "test set", .. })
        ));
        assert_eq!(net.train(&good, None), Err(Error::Uninitialized));

        let config: TrainingConfig = serde_json::from_str(r#"{"minibatch": 0}"#).unwrap();
        let mut net = Network::new(0).with_config(config);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        assert!(matches!(net.train(&good, None), Err(Error::Config(_))));
        assert!(net.history().is_empty());
    }

    #[test]
    fn empty_data_is_a_no_op() {
        let mut net = Network::new(0);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        let before = weights(&net);
        net.train(&Dataset::default(), None).unwrap();
        assert_eq!(weights(&net), before);
        assert!(net.history().is_empty());
    }

    #[test]
    fn history_follows_switches() {
        let data = toy();
        let mut net = Network::new(1);
        net.create_feed_forward(&[2, 3, 2], LayerKind::Sigmoid);
        net.set_training_iters(3);
        net.set_check_correct(false);
        net.train(&data, Some(&data)).unwrap();

        let history = net.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.cost.len(), 3);
        assert!(history.train_accuracy.is_empty());
        assert_eq!(history.test_accuracy.len(), 3);
    }

    #[test]
    fn training_lowers_the_cost() {
        let data = toy();
        let mut net = Network::new(2);
        net.create_feed_forward(&[2, 4, 2], LayerKind::Sigmoid);
        net.set_rate(2.);
        net.set_minibatch(4);
        net.set_training_iters(50);
        let before = net.cost(&data).unwrap();
        net.train(&data, None).unwrap();
        assert!(net.cost(&data).unwrap() < before);
        assert!(net.evaluate_accuracy(&data).unwrap() > 0.99);
    }

    #[test]
    fn subset_limits_the_samples() {
        let mut data = toy();
        // anything past the subset would fail the forward pass
        data.inputs.push(Tensor::column(&[1., 2., 3.]));
        data.targets.push(Tensor::column(&[1., 0.]));
        let mut net = Network::new(3);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        net.set_training_iters(2);
        net.config_mut().subset = Some(40);
        assert!(net.train(&data, None).is_ok());
        net.config_mut().subset = None;
        assert!(matches!(
            net.train(&data, None),
            Err(Error::DimsMismatch { .. })
        ));
    }

    #[test]
    fn rate_decays_when_test_accuracy_stalls() {
        let data = toy();
        let mut net = Network::new(4);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        // far too small to move any weight, so the accuracy never improves
        net.set_rate(1e-30);
        net.set_training_iters(3);
        net.set_rate_decay(Some(0.5));
        net.train(&data, Some(&data)).unwrap();
        assert_eq!(net.history().test_accuracy.len(), 3);
        assert_eq!(net.config().rate, 1e-30 * 0.25);
    }

    #[test]
    fn periodic_save_writes_the_network() {
        let path = std::env::temp_dir().join(format!("rusty-backprop-{}-backup.net", std::process::id()));
        let data = toy();
        let mut net = Network::new(6);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        net.set_training_iters(2);
        net.config_mut().save_every = Some(2);
        net.config_mut().save_path = path.clone();
        net.train(&data, None).unwrap();

        let mut loaded = Network::new(0);
        loaded.load_network(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(weights(&loaded), weights(&net));
    }

    #[test]
    fn auto_encoder_learns_its_inputs() {
        let data = toy();
        let mut net = Network::new(5);
        net.create_auto_encoder(&[2, 3], LayerKind::Sigmoid).unwrap();
        net.set_rate(2.);
        net.set_minibatch(4);
        net.set_training_iters(30);
        let auto = AutoEncode(&data);
        let before = net.cost(&auto).unwrap();
        net.train_auto_encoder(&data).unwrap();
        assert!(net.cost(&auto).unwrap() < before);
        // tied weights stayed tied
        let layers = net.layers();
        assert!(layers[0].tensor(0).unwrap().ptr_eq(&layers[1].tensor(0).unwrap()));
    }

    #[test]
    fn config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("rusty-backprop-{}-config.json", std::process::id()));
        let mut config = TrainingConfig::default();
        config.rate = 0.5;
        config.rate_decay = Some(0.9);
        config.to_file(&path).unwrap();
        let loaded = TrainingConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);

        let partial: TrainingConfig = serde_json::from_str(r#"{"minibatch": 32}"#).unwrap();
        assert_eq!(partial.minibatch, 32);
        assert_eq!(partial.rate, 0.01);
    }
}
