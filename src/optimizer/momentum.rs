use crate::error::Result;
use crate::linalg;
use crate::tensor::{Tensor, TensorView};

use serde::{Deserialize, Serialize};

/// Velocity based descent. `decay` is the fraction of the velocity lost every step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub decay: f32,
}

impl Momentum {
    pub fn new(decay: f32) -> Self {
        Self { decay }
    }

    /// `velocity ← (1 − decay)·velocity + factor·delta`, then
    /// `params ← shrink·params − velocity`.
    ///
    /// The velocity mirrors the storage order of `params`, so the last step
    /// walks both buffers flat. Panics if their lengths differ.
    pub fn step(
        &self,
        params: &mut Tensor,
        velocity: &mut Tensor,
        delta: TensorView<'_>,
        factor: f32,
        shrink: f32,
    ) -> Result<()> {
        linalg::times_eq(velocity, 1. - self.decay);
        linalg::plus_eq(velocity, delta, factor)?;
        if shrink != 1. {
            linalg::times_eq(params, shrink);
        }
        linalg::minus_eq_unchecked(params, velocity.view(), 1.);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    #[test]
    fn velocity_carries_over() {
        let m = Momentum::new(0.5);
        let mut w = Tensor::column(&[0.]);
        let mut v = Tensor::column(&[0.]);
        let d = Tensor::column(&[1.]);
        m.step(&mut w, &mut v, d.view(), 1., 1.).unwrap();
        assert_eq!((w.data()[0], v.data()[0]), (-1., 1.));
        m.step(&mut w, &mut v, d.view(), 1., 1.).unwrap();
        assert_eq!((w.data()[0], v.data()[0]), (-2.5, 1.5));
    }

    #[test]
    fn velocity_follows_storage_order() {
        let m = Momentum::new(0.);
        let mut w = Tensor::new(Shape::matrix(1, 2));
        w.transpose();
        let mut v = Tensor::new(Shape::matrix(1, 2));
        let d = Tensor::from_vec(Shape::matrix(1, 2), vec![1., 2.]).unwrap();
        m.step(&mut w, &mut v, d.view(), 1., 1.).unwrap();
        assert_eq!(w.data(), &[-1., -2.]);
        assert!(w.is_transposed());
    }
}
