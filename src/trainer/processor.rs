use super::distributed::Communicator;
use super::Processor;
use crate::error::{Error, Result};
use crate::helpers::one_hot;
use crate::layers::{BasicLayer, Neuron};
use crate::network::Workspace;
use crate::storage::Deltas;
use crate::tensor::Tensor;

use parking_lot::Mutex;

use std::ops::AddAssign;

/// Indexed pairs of inputs and targets.
pub trait TrainingData {
    /// Input and target of sample `idx`.
    fn sample(&self, idx: usize) -> (&Tensor, &Tensor);

    /// Number of samples.
    fn len(&self) -> usize;

    /// Number of targets. Only differs from [`len`](Self::len) for malformed data.
    fn target_count(&self) -> usize {
        self.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, what: &'static str) -> Result<()> {
        if self.len() == self.target_count() {
            Ok(())
        } else {
            Err(Error::DataMismatch {
                what,
                inputs: self.len(),
                targets: self.target_count(),
            })
        }
    }
}

/// Inputs and targets held in two parallel vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub inputs: Vec<Tensor>,
    pub targets: Vec<Tensor>,
}

impl Dataset {
    pub fn new(inputs: Vec<Tensor>, targets: Vec<Tensor>) -> Self {
        Self { inputs, targets }
    }

    /// Converts class labels into one-hot target columns.
    /// A label outside `0..classes` is an out of bounds error.
    pub fn from_labels(inputs: Vec<Tensor>, labels: &[usize], classes: usize) -> Result<Self> {
        let targets = labels
            .iter()
            .map(|&l| one_hot(l, classes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { inputs, targets })
    }
}

impl TrainingData for Dataset {
    fn sample(&self, idx: usize) -> (&Tensor, &Tensor) {
        (&self.inputs[idx], &self.targets[idx])
    }

    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn target_count(&self) -> usize {
        self.targets.len()
    }
}

/// Uses every input as its own target.
#[derive(Debug, Clone, Copy)]
pub struct AutoEncode<'a, D: ?Sized>(pub &'a D);

impl<'a, D: TrainingData + ?Sized> TrainingData for AutoEncode<'a, D> {
    fn sample(&self, idx: usize) -> (&Tensor, &Tensor) {
        let (input, _) = self.0.sample(idx);
        (input, input)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Running totals of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub correct: usize,
    pub error: f64,
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.correct += other.correct;
        self.error += other.error;
    }
}

/// How accumulated deltas reach the parameters at the end of a minibatch.
#[derive(Clone, Copy)]
pub(crate) enum Apply<'a> {
    /// Sole owner of the parameters.
    Local,
    /// Parameters shared with other workers, descend while holding the lock.
    Locked(&'a Mutex<()>),
    /// Sum the deltas across replicas first.
    AllReduce(&'a dyn Communicator),
}

/// Runs samples through the network and applies gradient descent once per minibatch.
pub(crate) struct GenericProcessor<'a> {
    layers: &'a [BasicLayer],
    workspace: &'a mut Workspace,
    deltas: &'a [Deltas],
    data: &'a dyn TrainingData,
    check_correct: bool,
    track_error: bool,
    apply: Apply<'a>,
    pub tally: Tally,
}

impl<'a> GenericProcessor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        layers: &'a [BasicLayer],
        workspace: &'a mut Workspace,
        deltas: &'a [Deltas],
        data: &'a dyn TrainingData,
        check_correct: bool,
        track_error: bool,
        apply: Apply<'a>,
    ) -> Self {
        Self {
            layers,
            workspace,
            deltas,
            data,
            check_correct,
            track_error,
            apply,
            tally: Tally::default(),
        }
    }
}

impl<'a> Processor for GenericProcessor<'a> {
    fn process(&mut self, idx: usize) -> Result<()> {
        let data = self.data;
        let (input, target) = data.sample(idx);
        self.workspace.forward(self.layers, input)?;
        if self.check_correct && self.workspace.is_correct(target)? {
            self.tally.correct += 1;
        }
        if self.track_error {
            self.tally.error += self.workspace.cost(target)? as f64;
        }
        self.workspace
            .backward(self.layers, input, target, self.deltas)
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.deltas.iter().for_each(Deltas::zero);
        self.workspace.clear_errors();
        Ok(())
    }

    fn end_batch(&mut self, factor: f32) -> Result<()> {
        if let Apply::AllReduce(comm) = self.apply {
            for deltas in self.deltas {
                comm.all_reduce_sum(deltas.weights.write().data_mut());
                comm.all_reduce_sum(deltas.biases.write().data_mut());
            }
        }
        let _guard = match self.apply {
            Apply::Locked(lock) => Some(lock.lock()),
            _ => None,
        };
        for (layer, deltas) in self.layers.iter().zip(self.deltas) {
            layer.descend(factor, deltas)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    #[test]
    fn dataset_validation() {
        let x = Tensor::column(&[1.]);
        let good = Dataset::new(vec![x.clone(), x.clone()], vec![x.clone(), x.clone()]);
        assert!(good.validate("training set").is_ok());
        let bad = Dataset::new(vec![x.clone(), x.clone()], vec![x]);
        assert_eq!(
            bad.validate("training set"),
            Err(Error::DataMismatch {
                what: "training set",
                inputs: 2,
                targets: 1
            })
        );
    }

    #[test]
    fn labels_become_one_hot() {
        let inputs = vec![Tensor::column(&[0.]), Tensor::column(&[1.])];
        let data = Dataset::from_labels(inputs.clone(), &[2, 0], 3).unwrap();
        assert_eq!(data.sample(0).1.data(), &[0., 0., 1.]);
        assert_eq!(data.sample(1).1.shape(), &Shape::matrix(3, 1));
        assert!(matches!(
            Dataset::from_labels(inputs, &[1, 3], 3),
            Err(Error::OutOfBounds { index: 3, extent: 3, .. })
        ));
    }

    #[test]
    fn auto_encode_targets_its_inputs() {
        let data = Dataset::new(vec![Tensor::column(&[3., 4.])], vec![]);
        let auto = AutoEncode(&data);
        assert!(auto.validate("auto encoder").is_ok());
        let (input, target) = auto.sample(0);
        assert_eq!(input, target);
    }

    #[test]
    fn tallies_add_up() {
        let mut total = Tally::default();
        total += Tally { correct: 2, error: 0.5 };
        total += Tally { correct: 1, error: 0.25 };
        assert_eq!(total, Tally { correct: 3, error: 0.75 });
    }
}
