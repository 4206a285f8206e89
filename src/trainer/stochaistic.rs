use crate::error::Result;

use std::ops::Range;

/// This trait must be implemented by everything driven by [`Stochaistic`].
/// The processor is handed sample indices one at a time and is notified at the
/// start and end of every minibatch. `end_batch` receives the learning rate
/// already divided by the number of samples in that batch.
pub trait Processor {
    fn process(&mut self, idx: usize) -> Result<()>;

    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_batch(&mut self, factor: f32) -> Result<()>;
}

/// Splits `len` samples into `len / minibatch` full batches followed by one
/// residual batch of `len % minibatch` samples, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub len: usize,
    pub minibatch: usize,
}

impl Partition {
    /// Panics on a zero minibatch.
    pub fn new(len: usize, minibatch: usize) -> Self {
        assert!(minibatch > 0, "Minibatch size must be positive");
        Self { len, minibatch }
    }

    pub fn full(&self) -> usize {
        self.len / self.minibatch
    }

    pub fn residual(&self) -> usize {
        self.len % self.minibatch
    }

    /// Position ranges of every batch, the residual one last.
    pub fn batches(&self) -> impl Iterator<Item = Range<usize>> {
        let Partition { len, minibatch } = *self;
        (0..len)
            .step_by(minibatch)
            .map(move |start| start..len.min(start + minibatch))
    }
}

/// Drives a [`Processor`] through one pass over a fixed sample order.
///
/// A shared trainer only processes the positions `p` with `p % size == rank`,
/// while every member still steps through the same batches and the same factors.
#[derive(Debug)]
pub(crate) struct Stochaistic<'a> {
    order: &'a [usize],
    partition: Partition,
    rate: f32,
    rank: usize,
    size: usize,
}

impl<'a> Stochaistic<'a> {
    pub fn new(order: &'a [usize], minibatch: usize, rate: f32) -> Self {
        Self {
            order,
            partition: Partition::new(order.len(), minibatch),
            rate,
            rank: 0,
            size: 1,
        }
    }

    pub fn shared(mut self, rank: usize, size: usize) -> Self {
        assert!(rank < size, "Rank {} outside a group of {}", rank, size);
        self.rank = rank;
        self.size = size;
        self
    }

    /// Processes every batch. Returns the number of batches.
    pub fn run<P: Processor + ?Sized>(&self, processor: &mut P) -> Result<usize> {
        let mut batches = 0;
        for batch in self.partition.batches() {
            let factor = self.rate / batch.len() as f32;
            processor.begin_batch()?;
            for pos in batch.filter(|p| p % self.size == self.rank) {
                processor.process(self.order[pos])?;
            }
            processor.end_batch(factor)?;
            batches += 1;
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<usize>,
        factors: Vec<f32>,
        open: bool,
    }

    impl Processor for Recorder {
        fn process(&mut self, idx: usize) -> Result<()> {
            assert!(self.open);
            self.seen.push(idx);
            Ok(())
        }

        fn begin_batch(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }

        fn end_batch(&mut self, factor: f32) -> Result<()> {
            self.open = false;
            self.factors.push(factor);
            Ok(())
        }
    }

    #[test]
    fn partition_counts() {
        let p = Partition::new(23, 5);
        assert_eq!((p.full(), p.residual()), (4, 3));
        let batches: Vec<_> = p.batches().collect();
        assert_eq!(batches.len(), 5);
        assert_eq!(batches[4], 20..23);

        let even = Partition::new(20, 5);
        assert_eq!(even.residual(), 0);
        assert_eq!(even.batches().count(), 4);
        assert_eq!(Partition::new(0, 5).batches().count(), 0);
        assert_eq!(Partition::new(3, 5).batches().collect::<Vec<_>>(), vec![0..3]);
    }

    #[test]
    fn residual_batch_gets_its_own_factor() {
        let order: Vec<usize> = (0..7).rev().collect();
        let mut rec = Recorder::default();
        let batches = Stochaistic::new(&order, 3, 6.).run(&mut rec).unwrap();
        assert_eq!(batches, 3);
        assert_eq!(rec.seen, order);
        assert_eq!(rec.factors, vec![2., 2., 6.]);
    }

    #[test]
    fn shared_runs_split_by_position() {
        let order: Vec<usize> = (10..17).collect();
        let mut first = Recorder::default();
        let mut second = Recorder::default();
        Stochaistic::new(&order, 4, 1.).shared(0, 2).run(&mut first).unwrap();
        Stochaistic::new(&order, 4, 1.).shared(1, 2).run(&mut second).unwrap();
        assert_eq!(first.seen, vec![10, 12, 14, 16]);
        assert_eq!(second.seen, vec![11, 13, 15]);
        assert_eq!(first.factors, second.factors);
    }

    #[test]
    #[should_panic]
    fn zero_minibatch_panics() {
        Partition::new(10, 0);
    }
}
