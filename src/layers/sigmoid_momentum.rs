use super::{Neuron, Scratch, SigmoidLayer};
use crate::error::Result;
use crate::optimizer::Momentum;
use crate::shape::Shape;
use crate::storage::{Deltas, SharedTensor};
use crate::tensor::{Tensor, TensorView};

/// [`SigmoidLayer`] whose updates go through a velocity instead of the raw deltas.
#[derive(Debug, Clone)]
pub struct SigmoidMomentumLayer {
    inner: SigmoidLayer,
    momentum: Momentum,
    weight_velocity: SharedTensor,
    bias_velocity: SharedTensor,
}

impl SigmoidMomentumLayer {
    pub fn new(inner: SigmoidLayer, momentum: Momentum) -> Self {
        let deltas = inner.deltas();
        Self {
            weight_velocity: SharedTensor::zeroed(deltas.weights.shape()),
            bias_velocity: SharedTensor::zeroed(deltas.biases.shape()),
            inner,
            momentum,
        }
    }
}

impl Neuron for SigmoidMomentumLayer {
    fn in_shape(&self) -> &Shape {
        self.inner.in_shape()
    }

    fn out_shape(&self) -> &Shape {
        self.inner.out_shape()
    }

    fn is_transposed(&self) -> bool {
        self.inner.is_transposed()
    }

    fn deltas(&self) -> &Deltas {
        self.inner.deltas()
    }

    fn scratch(&self) -> Scratch {
        self.inner.scratch()
    }

    fn feed_forward(
        &self,
        input: TensorView<'_>,
        output: &mut Tensor,
        zout: &mut Tensor,
    ) -> Result<()> {
        self.inner.feed_forward(input, output, zout)
    }

    fn back_propagate(
        &self,
        delta_in: TensorView<'_>,
        delta_out: &mut Tensor,
        zout: TensorView<'_>,
        scratch: &mut Scratch,
    ) -> Result<()> {
        self.inner.back_propagate(delta_in, delta_out, zout, scratch)
    }

    fn accumulate(
        &self,
        input: TensorView<'_>,
        delta: TensorView<'_>,
        deltas: &Deltas,
        scratch: &mut Scratch,
    ) -> Result<()> {
        self.inner.accumulate(input, delta, deltas, scratch)
    }

    fn descend(&self, factor: f32, deltas: &Deltas) -> Result<()> {
        self.momentum.step(
            &mut self.inner.weights().write(),
            &mut self.weight_velocity.write(),
            deltas.weights.read().view(),
            factor,
            self.inner.shrink(),
        )?;
        self.momentum.step(
            &mut self.inner.biases().write(),
            &mut self.bias_velocity.write(),
            deltas.biases.read().view(),
            factor,
            1.,
        )
    }

    fn set_l2_factor(&mut self, l2_factor: f32) {
        self.inner.set_l2_factor(l2_factor)
    }

    fn tensor(&self, slot: usize) -> Result<SharedTensor> {
        self.inner.tensor(slot)
    }

    fn set_tensor(&mut self, slot: usize, tensor: SharedTensor) -> Result<()> {
        self.inner.set_tensor(slot, tensor)
    }
}
