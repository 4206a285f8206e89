use super::processor::{Apply, GenericProcessor, Tally, TrainingData};
use super::stochaistic::Stochaistic;
use crate::error::{Error, Result};
use crate::layers::Neuron;
use crate::network::Network;
use crate::storage::{Deltas, TensorSlot};

use parking_lot::Mutex;
use tracing::debug;

use std::ops::AddAssign;
use std::sync::{Arc, Barrier};
use std::time::Instant;

/// Collective operations between the replicas of a distributed run.
///
/// Every call is collective: all members must make the same calls in the same
/// order with buffers of the same length, otherwise they block forever.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn barrier(&self);

    /// Overwrites `buf` on every member with the contents it has on `root`.
    fn broadcast(&self, buf: &mut [f32], root: usize);

    fn broadcast_indices(&self, buf: &mut [usize], root: usize);

    /// Replaces `buf` on every member with the element-wise sum over all members.
    fn all_reduce_sum(&self, buf: &mut [f32]);

    fn all_reduce_sum_f64(&self, buf: &mut [f64]);
}

#[derive(Debug, Default)]
struct Exchange {
    f32s: Mutex<Vec<f32>>,
    f64s: Mutex<Vec<f64>>,
    indices: Mutex<Vec<usize>>,
}

/// In-process group of replicas, one [`LocalComm`] per thread.
#[derive(Debug, Clone)]
pub struct LocalCluster {
    size: usize,
    barrier: Arc<Barrier>,
    exchange: Arc<Exchange>,
}

impl LocalCluster {
    /// Panics on an empty group.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "A cluster needs at least one member");
        Self {
            size,
            barrier: Arc::new(Barrier::new(size)),
            exchange: Arc::default(),
        }
    }

    pub fn comm(&self, rank: usize) -> LocalComm {
        assert!(rank < self.size, "Rank {} outside a group of {}", rank, self.size);
        LocalComm {
            rank,
            cluster: self.clone(),
        }
    }

    /// One communicator per rank, in rank order.
    pub fn comms(&self) -> Vec<LocalComm> {
        (0..self.size).map(|rank| self.comm(rank)).collect()
    }
}

/// A member of a [`LocalCluster`].
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    cluster: LocalCluster,
}

impl LocalComm {
    fn wait(&self) {
        self.cluster.barrier.wait();
    }

    fn reduce<T: Copy + Default + AddAssign>(&self, slot: &Mutex<Vec<T>>, buf: &mut [T]) {
        self.wait();
        if self.rank == 0 {
            *slot.lock() = vec![T::default(); buf.len()];
        }
        self.wait();
        {
            let mut sum = slot.lock();
            assert_eq!(sum.len(), buf.len(), "All-reduce with uneven buffers");
            sum.iter_mut().zip(buf.iter()).for_each(|(s, x)| *s += *x);
        }
        self.wait();
        buf.copy_from_slice(&slot.lock());
    }

    fn share<T: Copy>(&self, slot: &Mutex<Vec<T>>, buf: &mut [T], root: usize) {
        self.wait();
        if self.rank == root {
            *slot.lock() = buf.to_vec();
        }
        self.wait();
        if self.rank != root {
            buf.copy_from_slice(&slot.lock());
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.cluster.size
    }

    fn barrier(&self) {
        self.wait();
    }

    fn broadcast(&self, buf: &mut [f32], root: usize) {
        self.share(&self.cluster.exchange.f32s, buf, root);
    }

    fn broadcast_indices(&self, buf: &mut [usize], root: usize) {
        self.share(&self.cluster.exchange.indices, buf, root);
    }

    fn all_reduce_sum(&self, buf: &mut [f32]) {
        self.reduce(&self.cluster.exchange.f32s, buf);
    }

    fn all_reduce_sum_f64(&self, buf: &mut [f64]) {
        self.reduce(&self.cluster.exchange.f64s, buf);
    }
}

impl Network {
    /// Trains one replica of a data parallel group.
    ///
    /// Every member calls this with the same topology, configuration and data.
    /// Rank 0's parameters and sample order are broadcast so the replicas stay
    /// identical, each member processes every `size`-th sample of a minibatch
    /// and the summed deltas are applied everywhere. Only rank 0 saves.
    pub fn train_distributed(
        &mut self,
        comm: &dyn Communicator,
        data: &dyn TrainingData,
        test: Option<&dyn TrainingData>,
    ) -> Result<()> {
        let n = match self.prepare(data, test)? {
            Some(n) => n,
            None => return Ok(()),
        };
        let (rank, size) = (comm.rank(), comm.size());
        for layer in &self.layers {
            for slot in [TensorSlot::Weights, TensorSlot::Biases] {
                comm.broadcast(layer.tensor(slot as usize)?.write().data_mut(), 0);
            }
        }
        debug!(rank, size, "Replica synchronised");

        let deltas: Vec<Deltas> = self.layers.iter().map(|l| l.deltas().clone()).collect();
        for iteration in 0..self.config.iterations {
            let started = Instant::now();
            let mut order = if rank == 0 { self.order(n) } else { vec![0; n] };
            comm.broadcast_indices(&mut order, 0);

            let workspace = self.workspace.as_mut().ok_or(Error::Uninitialized)?;
            let mut processor = GenericProcessor::new(
                &self.layers,
                workspace,
                &deltas,
                data,
                self.config.check_correct,
                self.config.track_error,
                Apply::AllReduce(comm),
            );
            Stochaistic::new(&order, self.config.minibatch, self.config.rate)
                .shared(rank, size)
                .run(&mut processor)?;

            let mut totals = [processor.tally.correct as f64, processor.tally.error];
            comm.all_reduce_sum_f64(&mut totals);
            let tally = Tally {
                correct: totals[0].round() as usize,
                error: totals[1],
            };
            self.finish_iteration(iteration, tally, n, started, test, rank == 0)?;
        }
        Ok(())
    }
}
