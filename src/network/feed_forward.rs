use crate::error::Result;
use crate::layers::{BasicLayer, Neuron, Scratch};
use crate::loss::{LossFunc, SquaredError};
use crate::storage::Deltas;
use crate::tensor::{self, Layout, Tensor};

/// Per sample buffers of a forward/backward pass.
///
/// Allocated once per topology and overwritten for every sample. The network
/// owns one, every worker thread owns its own.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Samples are viewed through this layout instead of being copied.
    input: Layout,
    /// Same for targets.
    output: Layout,
    aout: Vec<Tensor>,
    zout: Vec<Tensor>,
    delta: Vec<Tensor>,
    scratch: Vec<Scratch>,
}

impl Workspace {
    pub fn new(layers: &[BasicLayer]) -> Self {
        assert!(!layers.is_empty(), "A workspace needs at least one layer");
        let fresh = || -> Vec<Tensor> {
            layers
                .iter()
                .map(|l| Tensor::new(l.out_shape().clone()))
                .collect()
        };
        Self {
            input: Layout::new(layers[0].in_shape().clone()),
            output: Layout::new(layers[layers.len() - 1].out_shape().clone()),
            aout: fresh(),
            zout: fresh(),
            delta: fresh(),
            scratch: layers.iter().map(Neuron::scratch).collect(),
        }
    }

    /// Activation of the last layer after [`forward`](Self::forward).
    pub fn output(&self) -> &Tensor {
        &self.aout[self.aout.len() - 1]
    }

    pub fn forward(&mut self, layers: &[BasicLayer], sample: &Tensor) -> Result<()> {
        let input = self.input.view(sample.data())?;
        for (i, layer) in layers.iter().enumerate() {
            let (done, rest) = self.aout.split_at_mut(i);
            let x = if i == 0 { input } else { done[i - 1].view() };
            layer.feed_forward(x, &mut rest[0], &mut self.zout[i])?;
        }
        Ok(())
    }

    /// Whether the largest output sits where the largest target value does.
    pub fn is_correct(&self, target: &Tensor) -> Result<bool> {
        let target = self.output.view(target.data())?;
        Ok(self.output().argmax() == tensor::argmax(target))
    }

    pub fn cost(&self, target: &Tensor) -> Result<f32> {
        let target = self.output.view(target.data())?;
        SquaredError::cost(self.output().view(), target)
    }

    /// Output error, backpropagation and accumulation into `deltas`.
    /// Expects the activations of a preceding [`forward`](Self::forward) on `sample`.
    pub fn backward(
        &mut self,
        layers: &[BasicLayer],
        sample: &Tensor,
        target: &Tensor,
        deltas: &[Deltas],
    ) -> Result<()> {
        let last = layers.len() - 1;
        let target = self.output.view(target.data())?;
        SquaredError::output_error(self.aout[last].view(), target, &mut self.delta[last])?;

        for j in (1..=last).rev() {
            let (lower, upper) = self.delta.split_at_mut(j);
            layers[j].back_propagate(
                upper[0].view(),
                &mut lower[j - 1],
                self.zout[j - 1].view(),
                &mut self.scratch[j],
            )?;
        }

        let input = self.input.view(sample.data())?;
        for (j, layer) in layers.iter().enumerate() {
            let x = if j == 0 { input } else { self.aout[j - 1].view() };
            layer.accumulate(x, self.delta[j].view(), &deltas[j], &mut self.scratch[j])?;
        }
        Ok(())
    }

    pub fn clear_errors(&mut self) {
        self.delta.iter_mut().for_each(Tensor::zero);
    }
}
