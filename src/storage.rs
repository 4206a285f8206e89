use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use std::convert::TryFrom;
use std::fmt::Debug;
use std::sync::Arc;

/// A reference counted, lock guarded tensor.
///
/// Layer parameters live behind this handle so tied layers and worker threads
/// can all point at the same weights. Cloning the handle shares the tensor, use
/// [`SharedTensor::detached`] for an independent copy.
#[derive(Clone, Default)]
pub struct SharedTensor(Arc<RwLock<Tensor>>);

impl SharedTensor {
    pub fn new(tensor: Tensor) -> Self {
        Self(Arc::new(RwLock::new(tensor)))
    }

    pub fn zeroed(shape: Shape) -> Self {
        Self::new(Tensor::new(shape))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Tensor> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Tensor> {
        self.0.write()
    }

    pub fn shape(&self) -> Shape {
        self.read().shape().clone()
    }

    /// Deep copy that no one else references.
    pub fn detached(&self) -> Self {
        Self::new(self.read().clone())
    }

    /// True when both handles point at the same tensor.
    pub fn ptr_eq(&self, other: &SharedTensor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for SharedTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedTensor").field(&*self.read()).finish()
    }
}

impl From<Tensor> for SharedTensor {
    fn from(tensor: Tensor) -> Self {
        Self::new(tensor)
    }
}

/// Per minibatch gradient accumulators of one layer.
#[derive(Debug, Clone)]
pub struct Deltas {
    pub weights: SharedTensor,
    pub biases: SharedTensor,
}

impl Deltas {
    pub fn new(weights: Shape, biases: Shape) -> Self {
        Self {
            weights: SharedTensor::zeroed(weights),
            biases: SharedTensor::zeroed(biases),
        }
    }

    pub fn zero(&self) {
        self.weights.write().zero();
        self.biases.write().zero();
    }

    /// Zeroed accumulators of the same shapes, private to the caller.
    pub fn detached(&self) -> Self {
        Self::new(self.weights.shape(), self.biases.shape())
    }
}

/// Index of a layer tensor, used to tie tensors between layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorSlot {
    Weights = 0,
    Biases = 1,
    WeightDelta = 2,
    BiasDelta = 3,
}

impl TryFrom<usize> for TensorSlot {
    type Error = Error;

    fn try_from(slot: usize) -> Result<Self> {
        match slot {
            0 => Ok(TensorSlot::Weights),
            1 => Ok(TensorSlot::Biases),
            2 => Ok(TensorSlot::WeightDelta),
            3 => Ok(TensorSlot::BiasDelta),
            _ => Err(Error::UnknownSlot(slot)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_detached_does_not() {
        let a = SharedTensor::zeroed(Shape::matrix(2, 2));
        let b = a.clone();
        b.write().fill(1.);
        assert_eq!(a.read().sum(), 4.);
        assert!(a.ptr_eq(&b));

        let c = a.detached();
        c.write().zero();
        assert_eq!(a.read().sum(), 4.);
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn slots() {
        assert_eq!(TensorSlot::try_from(2), Ok(TensorSlot::WeightDelta));
        assert_eq!(TensorSlot::try_from(4), Err(Error::UnknownSlot(4)));
    }
}
