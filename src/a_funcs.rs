use serde::{Deserialize, Serialize};

use std::fmt::{self, Debug};

pub trait ActivFunc {
    fn evaluate(x: f32) -> f32;
    /// Derivative at `x`.
    fn derivative(x: f32) -> f32;
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug)]
pub struct Sigmoid;
impl ActivFunc for Sigmoid {
    fn evaluate(x: f32) -> f32 {
        1. / (1. + (-x).exp())
    }
    fn derivative(x: f32) -> f32 {
        // from σ(x) itself, stays finite for large |x|
        let s = Self::evaluate(x);
        s * (1. - s)
    }
}

/// Doubles its input, which makes layer outputs easy to check by hand.
#[derive(Clone, Copy, Serialize, Deserialize, Debug)]
pub struct Test;
impl ActivFunc for Test {
    fn evaluate(x: f32) -> f32 {
        2. * x
    }
    fn derivative(_x: f32) -> f32 {
        2.
    }
}

/// An activation function and its derivative as plain function pointers, so
/// layers stay free of type parameters.
#[derive(Clone, Copy)]
pub struct Activation {
    pub evaluate: fn(f32) -> f32,
    pub derivative: fn(f32) -> f32,
}

impl Activation {
    pub fn of<F: ActivFunc>() -> Self {
        Self {
            evaluate: F::evaluate,
            derivative: F::derivative,
        }
    }

    pub fn sigmoid() -> Self {
        Self::of::<Sigmoid>()
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::sigmoid()
    }
}

impl Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Activation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_values() {
        assert_eq!(Sigmoid::evaluate(0.), 0.5);
        assert_eq!(Sigmoid::derivative(0.), 0.25);
        assert!(Sigmoid::evaluate(100.) <= 1.);
        assert!(Sigmoid::derivative(-100.).is_finite());
        assert!(Sigmoid::derivative(100.) >= 0.);
    }
}
