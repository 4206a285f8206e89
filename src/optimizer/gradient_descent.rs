use crate::error::Result;
use crate::linalg;
use crate::tensor::{Tensor, TensorView};

/// Gradient descent simply steps the parameters against their accumulated deltas.
#[derive(Clone, Copy, Debug, Default)]
pub struct GradientDescent;

impl GradientDescent {
    /// `params ← shrink·params − factor·delta`
    pub fn step(params: &mut Tensor, delta: TensorView<'_>, factor: f32, shrink: f32) -> Result<()> {
        if shrink != 1. {
            linalg::times_eq(params, shrink);
        }
        linalg::minus_eq(params, delta, factor)
    }
}
