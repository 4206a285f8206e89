//! Parameter update rules applied once per minibatch.

mod gradient_descent;
mod momentum;

pub use gradient_descent::GradientDescent;
pub use momentum::Momentum;

/// Multiplicative L2 shrink `1 - l2_factor / out_dim` applied to weights before each step.
pub fn l2_shrink(l2_factor: f32, out_dim: usize) -> f32 {
    1. - l2_factor / out_dim as f32
}
