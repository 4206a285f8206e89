use super::{Neuron, Scratch};
use crate::a_funcs::Activation;
use crate::error::{Error, Result};
use crate::initializer::Init;
use crate::linalg;
use crate::optimizer::{l2_shrink, GradientDescent};
use crate::shape::Shape;
use crate::storage::{Deltas, SharedTensor, TensorSlot};
use crate::tensor::{Tensor, TensorView};

use rand::Rng;

use std::convert::TryFrom;

/// Fully connected layer with a sigmoid activation.
///
/// A transposed layer stores its weights as `(in, out)` and contracts them
/// along the first axis, which lets a decoder reuse its encoder's weights.
#[derive(Debug, Clone)]
pub struct SigmoidLayer {
    in_shape: Shape,
    out_shape: Shape,

    weights: SharedTensor,
    biases: SharedTensor,
    deltas: Deltas,

    transposed: bool,
    l2_factor: f32,
    activation: Activation,
}

impl SigmoidLayer {
    pub fn new<R: Rng + ?Sized>(
        in_size: usize,
        out_size: usize,
        transposed: bool,
        init: Init,
        rng: &mut R,
    ) -> Self {
        let weight_shape = if transposed {
            Shape::matrix(in_size, out_size)
        } else {
            Shape::matrix(out_size, in_size)
        };
        let bias_shape = Shape::matrix(out_size, 1);

        let mut weights = Tensor::new(weight_shape.clone());
        init.weights(&mut weights, in_size, rng);
        let mut biases = Tensor::new(bias_shape.clone());
        init.biases(&mut biases, rng);

        Self {
            in_shape: Shape::matrix(in_size, 1),
            out_shape: bias_shape.clone(),
            weights: weights.into(),
            biases: biases.into(),
            deltas: Deltas::new(weight_shape, bias_shape),
            transposed,
            l2_factor: 0.,
            activation: Activation::sigmoid(),
        }
    }

    /// Swaps the activation function, sigmoid by default.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// `W ← shrink·W − factor·ΔW` with the L2 shrink of this layer.
    pub(crate) fn shrink(&self) -> f32 {
        l2_shrink(self.l2_factor, self.out_shape.total())
    }

    pub(crate) fn weights(&self) -> &SharedTensor {
        &self.weights
    }

    pub(crate) fn biases(&self) -> &SharedTensor {
        &self.biases
    }

    fn forward_axis(&self) -> usize {
        if self.transposed {
            0
        } else {
            1
        }
    }
}

impl Neuron for SigmoidLayer {
    fn in_shape(&self) -> &Shape {
        &self.in_shape
    }

    fn out_shape(&self) -> &Shape {
        &self.out_shape
    }

    fn is_transposed(&self) -> bool {
        self.transposed
    }

    fn deltas(&self) -> &Deltas {
        &self.deltas
    }

    fn scratch(&self) -> Scratch {
        Scratch {
            acc: Tensor::new(self.in_shape.clone()),
            diff: Tensor::new(self.deltas.weights.shape()),
        }
    }

    fn feed_forward(
        &self,
        input: TensorView<'_>,
        output: &mut Tensor,
        zout: &mut Tensor,
    ) -> Result<()> {
        {
            let weights = self.weights.read();
            linalg::multiply_axes(weights.view(), self.forward_axis(), input, 0, zout)?;
        }
        linalg::plus_eq(zout, self.biases.read().view(), 1.)?;
        linalg::apply(zout.view(), self.activation.evaluate, output)
    }

    fn back_propagate(
        &self,
        delta_in: TensorView<'_>,
        delta_out: &mut Tensor,
        zout: TensorView<'_>,
        scratch: &mut Scratch,
    ) -> Result<()> {
        {
            let weights = self.weights.read();
            let axis = 1 - self.forward_axis();
            linalg::multiply_axes(weights.view(), axis, delta_in, 0, &mut scratch.acc)?;
        }
        linalg::apply(zout, self.activation.derivative, delta_out)?;
        linalg::hadamard_eq(delta_out, scratch.acc.view())
    }

    fn accumulate(
        &self,
        input: TensorView<'_>,
        delta: TensorView<'_>,
        deltas: &Deltas,
        scratch: &mut Scratch,
    ) -> Result<()> {
        // the gradient is laid out like the stored weights
        if self.transposed {
            linalg::multiply_axes(input, 1, delta, 1, &mut scratch.diff)?;
        } else {
            linalg::multiply_axes(delta, 1, input, 1, &mut scratch.diff)?;
        }
        // both are laid out like the stored weights, see `scratch` and `Deltas::new`
        linalg::plus_eq_unchecked(&mut deltas.weights.write(), scratch.diff.view(), 1.);
        linalg::plus_eq(&mut deltas.biases.write(), delta, 1.)
    }

    fn descend(&self, factor: f32, deltas: &Deltas) -> Result<()> {
        GradientDescent::step(
            &mut self.weights.write(),
            deltas.weights.read().view(),
            factor,
            self.shrink(),
        )?;
        GradientDescent::step(
            &mut self.biases.write(),
            deltas.biases.read().view(),
            factor,
            1.,
        )
    }

    fn set_l2_factor(&mut self, l2_factor: f32) {
        self.l2_factor = l2_factor;
    }

    fn tensor(&self, slot: usize) -> Result<SharedTensor> {
        Ok(match TensorSlot::try_from(slot)? {
            TensorSlot::Weights => self.weights.clone(),
            TensorSlot::Biases => self.biases.clone(),
            TensorSlot::WeightDelta => self.deltas.weights.clone(),
            TensorSlot::BiasDelta => self.deltas.biases.clone(),
        })
    }

    fn set_tensor(&mut self, slot: usize, tensor: SharedTensor) -> Result<()> {
        let slot = TensorSlot::try_from(slot)?;
        let target = match slot {
            TensorSlot::Weights => &mut self.weights,
            TensorSlot::Biases => &mut self.biases,
            TensorSlot::WeightDelta => &mut self.deltas.weights,
            TensorSlot::BiasDelta => &mut self.deltas.biases,
        };
        let (expected, found) = (target.shape(), tensor.shape());
        if expected != found {
            return Err(Error::dims(&expected, &found));
        }
        *target = tensor;
        Ok(())
    }
}
