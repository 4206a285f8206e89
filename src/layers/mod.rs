pub mod sigmoid;
pub mod sigmoid_momentum;

pub use self::sigmoid::SigmoidLayer;
pub use self::sigmoid_momentum::SigmoidMomentumLayer;

use crate::error::Result;
use crate::initializer::Init;
use crate::optimizer::Momentum;
use crate::shape::Shape;
use crate::storage::{Deltas, SharedTensor};
use crate::tensor::{Tensor, TensorView};

use enum_dispatch::enum_dispatch;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fully connected layer mapping an `(in, 1)` activation onto an `(out, 1)` one.
///
/// Parameters are [`SharedTensor`]s, so every method except the setters works
/// through `&self`. Worker threads hold clones of the same layers and supply
/// their own [`Deltas`] and [`Scratch`].
#[enum_dispatch]
pub trait Neuron {
    fn in_shape(&self) -> &Shape;

    fn out_shape(&self) -> &Shape;

    /// Whether the weights are stored `(in, out)` and contracted along axis 0.
    fn is_transposed(&self) -> bool;

    /// The layer's own gradient accumulators.
    fn deltas(&self) -> &Deltas;

    /// Fresh backpropagation buffers sized for this layer.
    fn scratch(&self) -> Scratch;

    /// `zout = W·input + b`, `output = f(zout)`. Writes into the given buffers only.
    fn feed_forward(
        &self,
        input: TensorView<'_>,
        output: &mut Tensor,
        zout: &mut Tensor,
    ) -> Result<()>;

    /// `delta_out = (Wᵗ·delta_in) ⊙ f'(zout)` where `zout` is the
    /// pre-activation of the layer feeding this one.
    fn back_propagate(
        &self,
        delta_in: TensorView<'_>,
        delta_out: &mut Tensor,
        zout: TensorView<'_>,
        scratch: &mut Scratch,
    ) -> Result<()>;

    /// `ΔW += delta ⊗ inputᵗ`, `Δb += delta`.
    fn accumulate(
        &self,
        input: TensorView<'_>,
        delta: TensorView<'_>,
        deltas: &Deltas,
        scratch: &mut Scratch,
    ) -> Result<()>;

    /// Applies `deltas` scaled by `factor` to the parameters.
    fn descend(&self, factor: f32, deltas: &Deltas) -> Result<()>;

    fn set_l2_factor(&mut self, l2_factor: f32);

    /// Slots: 0 weights, 1 biases, 2 weight delta, 3 bias delta.
    fn tensor(&self, slot: usize) -> Result<SharedTensor>;

    /// Installs a tensor into a slot, typically another layer's to tie them.
    fn set_tensor(&mut self, slot: usize, tensor: SharedTensor) -> Result<()>;

    /// Zero the layer's own accumulators.
    fn clear(&self) {
        self.deltas().zero()
    }

    fn update_deltas(
        &self,
        input: TensorView<'_>,
        delta: TensorView<'_>,
        scratch: &mut Scratch,
    ) -> Result<()> {
        self.accumulate(input, delta, self.deltas(), scratch)
    }

    fn gradient_descent(&self, factor: f32) -> Result<()> {
        self.descend(factor, self.deltas())
    }
}

/// Every concrete layer the network can hold.
///
/// Cloning a layer shares its parameters.
#[enum_dispatch(Neuron)]
#[derive(Debug, Clone)]
pub enum BasicLayer {
    Sigmoid(SigmoidLayer),
    SigmoidMomentum(SigmoidMomentumLayer),
}

/// Which variant a topology is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Sigmoid,
    SigmoidMomentum(Momentum),
}

impl Default for LayerKind {
    fn default() -> Self {
        LayerKind::Sigmoid
    }
}

impl LayerKind {
    pub fn build<R: Rng + ?Sized>(
        &self,
        in_size: usize,
        out_size: usize,
        transposed: bool,
        init: Init,
        rng: &mut R,
    ) -> BasicLayer {
        let layer = SigmoidLayer::new(in_size, out_size, transposed, init, rng);
        match self {
            LayerKind::Sigmoid => layer.into(),
            LayerKind::SigmoidMomentum(momentum) => {
                SigmoidMomentumLayer::new(layer, *momentum).into()
            }
        }
    }
}

/// Per layer buffers for backpropagation, private to whoever runs the pass.
#[derive(Debug, Clone)]
pub struct Scratch {
    /// `Wᵗ·delta`, shaped like the layer input.
    pub(crate) acc: Tensor,
    /// One sample's weight gradient, shaped like the weights.
    pub(crate) diff: Tensor,
}

#[cfg(test)]
pub(crate) mod tests {
    /// Compares two arrays with the given error tolerance. Returns None if either of the arrays contains NaN.
    pub(crate) fn is_equal_ish(left: &[f32], right: &[f32], tolerance: f32) -> Option<bool> {
        assert_eq!(left.len(), right.len());
        let mut worst = 0f32;
        for (l, r) in left.iter().zip(right) {
            let err = (l - r).abs();
            if err.is_nan() {
                return None;
            }
            worst = worst.max(err);
        }
        Some(worst < tolerance)
    }

    pub(crate) fn check(expected: &[f32], output: &[f32], tolerance: f32, id: &str) {
        let diag = || format!("expected: {:?}\nreceived: {:?}", expected, output);

        match is_equal_ish(expected, output, tolerance) {
            Some(true) => {}
            Some(false) => panic!("Evaluation produced incorrect {}.\n{}", id, diag()),
            None => panic!("Evaluation produced a NaN\n{}", diag()),
        }
    }
}
