use super::processor::{Apply, GenericProcessor, Tally, TrainingData};
use super::stochaistic::Stochaistic;
use crate::error::{Error, Result};
use crate::layers::{BasicLayer, Neuron};
use crate::network::{Network, Workspace};
use crate::storage::Deltas;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// One training iteration as seen by the workers.
pub(crate) struct Job {
    pub data: Arc<dyn TrainingData + Send + Sync>,
    pub order: Arc<Vec<usize>>,
    pub minibatch: usize,
    pub rate: f32,
    pub l2_factor: f32,
    pub check_correct: bool,
    pub track_error: bool,
}

#[derive(Default)]
struct State {
    /// Bumped for every published job.
    generation: u64,
    job: Option<Arc<Job>>,
    pending: usize,
    tally: Tally,
    error: Option<Error>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    start: Condvar,
    done: Condvar,
    /// Held while a worker applies its deltas to the shared parameters.
    apply: Mutex<()>,
}

/// Fixed set of training threads sharing the network's parameters.
///
/// Every worker owns clones of the layers (which share the weights), a private
/// [`Workspace`] and private [`Deltas`]. The threads sleep on a condition
/// variable between jobs and are joined when the pool is dropped.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Panics on zero threads or an empty layer list.
    pub fn new(threads: usize, layers: &[BasicLayer]) -> Self {
        assert!(threads > 0, "Need at least one worker thread");
        let shared = Arc::new(Shared::default());
        let handles = (0..threads)
            .map(|id| {
                let worker = Worker {
                    id,
                    threads,
                    shared: shared.clone(),
                    layers: layers.to_vec(),
                    workspace: Workspace::new(layers),
                    deltas: layers.iter().map(|l| l.deltas().detached()).collect(),
                };
                thread::spawn(move || worker.run())
            })
            .collect();
        debug!(threads, "Spawned worker pool");
        Self { shared, handles }
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Publishes `job`, waits for every worker and sums their tallies.
    /// The first error any worker hit is returned.
    pub fn run(&self, job: Job) -> Result<Tally> {
        let mut state = self.shared.state.lock();
        state.job = Some(Arc::new(job));
        state.generation += 1;
        state.pending = self.handles.len();
        state.tally = Tally::default();
        state.error = None;
        self.shared.start.notify_all();

        while state.pending > 0 {
            self.shared.done.wait(&mut state);
        }
        state.job = None;
        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(state.tally),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.handles.len())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.start.notify_all();
        for handle in self.handles.drain(..) {
            // a panicked worker has nothing left to clean up
            let _ = handle.join();
        }
    }
}

struct Worker {
    id: usize,
    threads: usize,
    shared: Arc<Shared>,
    layers: Vec<BasicLayer>,
    workspace: Workspace,
    deltas: Vec<Deltas>,
}

impl Worker {
    fn run(mut self) {
        let mut seen = 0;
        loop {
            let job = {
                let mut state = self.shared.state.lock();
                while !state.shutdown && state.generation == seen {
                    self.shared.start.wait(&mut state);
                }
                if state.shutdown {
                    return;
                }
                seen = state.generation;
                state.job.clone()
            };

            let result = match job {
                Some(job) => panic::catch_unwind(AssertUnwindSafe(|| self.process(&job)))
                    .unwrap_or_else(|payload| {
                        Err(Error::WorkerPanicked(panic_message(&*payload)))
                    }),
                None => Ok(Tally::default()),
            };

            let mut state = self.shared.state.lock();
            match result {
                Ok(tally) => state.tally += tally,
                Err(e) => {
                    state.error.get_or_insert(e);
                }
            }
            state.pending -= 1;
            if state.pending == 0 {
                self.shared.done.notify_all();
            }
        }
    }

    /// Trains on this worker's contiguous share of the sample order.
    fn process(&mut self, job: &Job) -> Result<Tally> {
        let n = job.order.len();
        let chunk = n / self.threads;
        let start = self.id * chunk;
        let end = if self.id + 1 == self.threads {
            n
        } else {
            start + chunk
        };

        for layer in self.layers.iter_mut() {
            layer.set_l2_factor(job.l2_factor);
        }
        let mut processor = GenericProcessor::new(
            &self.layers,
            &mut self.workspace,
            &self.deltas,
            &*job.data,
            job.check_correct,
            job.track_error,
            Apply::Locked(&self.shared.apply),
        );
        Stochaistic::new(&job.order[start..end], job.minibatch, job.rate).run(&mut processor)?;
        Ok(processor.tally)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

impl Network {
    /// Like [`train`](Network::train) but spreads every iteration over a pool
    /// of `threads` workers, each descending on its own minibatches.
    ///
    /// The pool is created on first use and kept until the topology changes,
    /// the thread count changes or the network is dropped.
    pub fn train_concurrent(
        &mut self,
        data: Arc<dyn TrainingData + Send + Sync>,
        test: Option<&dyn TrainingData>,
    ) -> Result<()> {
        let threads = self.config.threads;
        if threads == 0 {
            return Err(Error::Config("the pool needs at least one thread".into()));
        }
        let n = match self.prepare(&*data, test)? {
            Some(n) => n,
            None => return Ok(()),
        };
        if self.pool.as_ref().map_or(true, |p| p.threads() != threads) {
            self.pool = Some(WorkerPool::new(threads, &self.layers));
        }

        for iteration in 0..self.config.iterations {
            let started = Instant::now();
            let job = Job {
                data: data.clone(),
                order: Arc::new(self.order(n)),
                minibatch: self.config.minibatch,
                rate: self.config.rate,
                l2_factor: self.config.l2_const * self.config.rate,
                check_correct: self.config.check_correct,
                track_error: self.config.track_error,
            };
            let tally = self
                .pool
                .as_ref()
                .ok_or(Error::Uninitialized)?
                .run(job)?;
            self.finish_iteration(iteration, tally, n, started, test, true)?;
        }
        Ok(())
    }
}
