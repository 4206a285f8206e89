use crate::tensor::Tensor;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// How fresh layers get their starting weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Init {
    /// Weights uniform in `±1/√in`, biases uniform in `±1`.
    Uniform,
    /// Weights drawn from a standard normal scaled by `1/√in`, biases zero.
    /// Suits symmetric activations such as sigmoid on wide layers.
    Xavier,
}

impl Default for Init {
    fn default() -> Self {
        Init::Uniform
    }
}

impl Init {
    pub fn weights<R: Rng + ?Sized>(&self, weights: &mut Tensor, in_size: usize, rng: &mut R) {
        let scale = 1. / (in_size as f32).sqrt();
        match self {
            Init::Uniform => weights.random(scale, rng),
            Init::Xavier => {
                for w in weights.data_mut() {
                    let x: f32 = StandardNormal.sample(rng);
                    *w = x * scale;
                }
            }
        }
    }

    pub fn biases<R: Rng + ?Sized>(&self, biases: &mut Tensor, rng: &mut R) {
        match self {
            Init::Uniform => biases.random(1., rng),
            Init::Xavier => biases.zero(),
        }
    }
}
