use super::{Network, Workspace};
use crate::error::{Error, Result};
use crate::layers::{BasicLayer, LayerKind, Neuron};
use crate::storage::TensorSlot;

use tracing::debug;

impl Network {
    /// Builds a fully connected chain over `neurons` (input size first).
    /// Any previous topology, its history and its worker pool are discarded.
    ///
    /// Panics with fewer than two sizes or a zero size.
    pub fn create_feed_forward(&mut self, neurons: &[usize], kind: LayerKind) {
        assert!(
            neurons.len() >= 2,
            "A network needs an input and at least one layer, got {:?}",
            neurons
        );
        let layers = neurons
            .windows(2)
            .map(|pair| kind.build(pair[0], pair[1], false, self.init, &mut self.rng))
            .collect();
        self.install(neurons.to_vec(), layers, kind);
    }

    /// Builds an encoder over `neurons` followed by its mirror image, so
    /// `[784, 100]` becomes `784 -> 100 -> 784`. Every decoder layer shares
    /// the weights of its mirrored encoder layer and reads them transposed.
    ///
    /// Panics with fewer than two sizes or a zero size.
    pub fn create_auto_encoder(&mut self, neurons: &[usize], kind: LayerKind) -> Result<()> {
        assert!(
            neurons.len() >= 2,
            "An auto encoder needs an input and at least one layer, got {:?}",
            neurons
        );
        let mut sizes = neurons.to_vec();
        sizes.extend(neurons.iter().rev().skip(1));

        let depth = neurons.len() - 1;
        let mut layers: Vec<BasicLayer> = Vec::with_capacity(2 * depth);
        for (i, pair) in sizes.windows(2).enumerate() {
            let decoder = i >= depth;
            let mut layer = kind.build(pair[0], pair[1], decoder, self.init, &mut self.rng);
            if decoder {
                let weights = layers[2 * depth - 1 - i].tensor(TensorSlot::Weights as usize)?;
                layer.set_tensor(TensorSlot::Weights as usize, weights)?;
            }
            layers.push(layer);
        }
        self.install(sizes, layers, kind);
        Ok(())
    }

    /// Appends freshly initialized layers of the current kind after the output,
    /// so `[4, 3]` grown by `[5, 2]` becomes `4 -> 3 -> 5 -> 2`.
    /// Existing layers keep their weights, ties and history.
    pub fn add_layers(&mut self, sizes: &[usize]) -> Result<()> {
        let last = *self.neurons.last().ok_or(Error::Uninitialized)?;
        if sizes.contains(&0) {
            return Err(Error::Topology(format!("zero layer size in {:?}", sizes)));
        }
        let mut layers = self.layers.clone();
        let mut input = last;
        for &size in sizes {
            layers.push(self.kind.build(input, size, false, self.init, &mut self.rng));
            input = size;
        }
        let mut neurons = self.neurons.clone();
        neurons.extend_from_slice(sizes);
        self.rebuild(neurons, layers);
        Ok(())
    }

    /// Removes the output layer. The previous layer becomes the output.
    pub fn pop_layer(&mut self) -> Result<()> {
        match self.layers.len() {
            0 => Err(Error::Uninitialized),
            1 => Err(Error::Topology("cannot remove the only layer".into())),
            n => {
                let layers = self.layers[..n - 1].to_vec();
                let neurons = self.neurons[..n].to_vec();
                self.rebuild(neurons, layers);
                Ok(())
            }
        }
    }

    /// Replaces the output layer with a fresh hidden layer of `size` followed
    /// by a fresh output layer of the old width. Every other layer is kept,
    /// which allows growing a trained network one hidden layer at a time.
    pub fn insert_hidden_layer(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::Topology("zero hidden layer size".into()));
        }
        let n = self.layers.len();
        if n == 0 {
            return Err(Error::Uninitialized);
        }
        let (before, output) = (self.neurons[n - 1], self.neurons[n]);
        let mut layers = self.layers[..n - 1].to_vec();
        layers.push(self.kind.build(before, size, false, self.init, &mut self.rng));
        layers.push(self.kind.build(size, output, false, self.init, &mut self.rng));
        let mut neurons = self.neurons[..n].to_vec();
        neurons.extend_from_slice(&[size, output]);
        self.rebuild(neurons, layers);
        Ok(())
    }

    fn install(&mut self, neurons: Vec<usize>, layers: Vec<BasicLayer>, kind: LayerKind) {
        self.kind = kind;
        self.history = Default::default();
        self.rebuild(neurons, layers);
    }

    /// Swaps in a new layer chain. Workspace and worker pool follow the layers.
    fn rebuild(&mut self, neurons: Vec<usize>, layers: Vec<BasicLayer>) {
        debug!(?neurons, "Created topology");
        self.workspace = Some(Workspace::new(&layers));
        self.neurons = neurons;
        self.layers = layers;
        self.pool = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::Init;
    use crate::optimizer::Momentum;
    use crate::shape::Shape;
    use crate::tensor::Tensor;

    #[test]
    fn feed_forward_shapes() {
        let mut net = Network::new(0);
        net.create_feed_forward(&[4, 3, 2], LayerKind::Sigmoid);
        assert!(net.is_initialized());
        assert_eq!(net.layers().len(), 2);
        assert_eq!(net.layers()[0].in_shape(), &Shape::matrix(4, 1));
        assert_eq!(net.layers()[1].out_shape(), &Shape::matrix(2, 1));
        assert_eq!(
            net.layers()[0].tensor(0).unwrap().shape(),
            Shape::matrix(3, 4)
        );
    }

    #[test]
    fn auto_encoder_ties_mirrored_weights() {
        let mut net = Network::new(0);
        net.create_auto_encoder(&[6, 4, 2], LayerKind::Sigmoid)
            .unwrap();
        assert_eq!(net.neurons(), &[6, 4, 2, 4, 6]);
        let layers = net.layers();
        assert_eq!(layers.len(), 4);
        assert!(layers[2].is_transposed() && layers[3].is_transposed());
        assert!(!layers[0].is_transposed());

        let enc = layers[0].tensor(0).unwrap();
        let dec = layers[3].tensor(0).unwrap();
        assert!(enc.ptr_eq(&dec));
        assert!(layers[1].tensor(0).unwrap().ptr_eq(&layers[2].tensor(0).unwrap()));
        // biases stay private
        assert!(!layers[0].tensor(1).unwrap().ptr_eq(&layers[3].tensor(1).unwrap()));

        let out = net.feed_forward(&Tensor::column(&[0.; 6])).unwrap();
        assert_eq!(out.shape(), &Shape::matrix(6, 1));
    }

    #[test]
    fn tied_layers_see_each_others_updates() {
        let mut net = Network::new(0);
        net.create_auto_encoder(&[3, 2], LayerKind::SigmoidMomentum(Momentum::new(0.1)))
            .unwrap();
        let layers = net.layers();
        layers[1].tensor(0).unwrap().write().fill(0.25);
        assert_eq!(layers[0].tensor(0).unwrap().read().sum(), 1.5);
    }

    #[test]
    fn recreating_resets_history() {
        let mut net = Network::new(0);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        net.history.cost.push(1.);
        net.create_feed_forward(&[2, 3, 2], LayerKind::Sigmoid);
        assert!(net.history().cost.is_empty());
        assert_eq!(net.layers().len(), 2);
    }

    fn snapshot(layer: &BasicLayer) -> (Tensor, Tensor) {
        (
            layer.tensor(0).unwrap().read().clone(),
            layer.tensor(1).unwrap().read().clone(),
        )
    }

    #[test]
    fn add_layers_keeps_trained_ones() {
        let mut net = Network::new(3);
        net.create_feed_forward(&[4, 3], LayerKind::Sigmoid);
        let kept = snapshot(&net.layers()[0]);
        net.history.cost.push(1.);

        net.set_initializer(Init::Xavier);
        net.add_layers(&[5, 2]).unwrap();
        assert_eq!(net.neurons(), &[4, 3, 5, 2]);
        assert_eq!(net.layers().len(), 3);
        assert_eq!(snapshot(&net.layers()[0]), kept);
        assert_eq!(net.layers()[1].tensor(0).unwrap().shape(), Shape::matrix(5, 3));
        // Xavier starts biases at zero
        assert_eq!(net.layers()[2].tensor(1).unwrap().read().sum(), 0.);
        assert_eq!(net.history().cost, vec![1.]);

        let out = net.feed_forward(&Tensor::column(&[0.5; 4])).unwrap();
        assert_eq!(out.shape(), &Shape::matrix(2, 1));
        assert!(matches!(net.add_layers(&[0]), Err(Error::Topology(_))));
        assert_eq!(Network::new(0).add_layers(&[2]), Err(Error::Uninitialized));
    }

    #[test]
    fn pop_layer_drops_the_output() {
        let mut net = Network::new(0);
        net.create_auto_encoder(&[6, 3], LayerKind::Sigmoid).unwrap();
        let encoder = net.layers()[0].tensor(0).unwrap();
        net.pop_layer().unwrap();
        assert_eq!(net.neurons(), &[6, 3]);
        assert!(net.layers()[0].tensor(0).unwrap().ptr_eq(&encoder));
        let out = net.feed_forward(&Tensor::column(&[0.; 6])).unwrap();
        assert_eq!(out.shape(), &Shape::matrix(3, 1));

        assert!(matches!(net.pop_layer(), Err(Error::Topology(_))));
        assert_eq!(Network::new(0).pop_layer(), Err(Error::Uninitialized));
    }

    #[test]
    fn insert_hidden_layer_before_output() {
        let mut net = Network::new(4);
        net.create_feed_forward(&[4, 3, 2], LayerKind::SigmoidMomentum(Momentum::new(0.1)));
        let kept = snapshot(&net.layers()[0]);
        let old_output = snapshot(&net.layers()[1]);

        net.set_initializer(Init::Xavier);
        net.insert_hidden_layer(5).unwrap();
        assert_eq!(net.neurons(), &[4, 3, 5, 2]);
        assert_eq!(snapshot(&net.layers()[0]), kept);
        assert_eq!(net.layers()[1].tensor(0).unwrap().shape(), Shape::matrix(5, 3));
        assert_eq!(net.layers()[2].tensor(0).unwrap().shape(), Shape::matrix(2, 5));
        assert_ne!(snapshot(&net.layers()[2]).0, old_output.0);
        assert_eq!(net.layers()[1].tensor(1).unwrap().read().sum(), 0.);
        assert!(matches!(
            net.layers()[2],
            BasicLayer::SigmoidMomentum(_)
        ));
        assert!(matches!(net.insert_hidden_layer(0), Err(Error::Topology(_))));
    }

    #[test]
    fn growing_drops_the_pool() {
        use crate::trainer::Dataset;
        use std::sync::Arc;

        let x = Tensor::column(&[1., 0.]);
        let data = Arc::new(Dataset::new(vec![x.clone()], vec![x]));
        let mut net = Network::new(0);
        net.create_feed_forward(&[2, 2], LayerKind::Sigmoid);
        net.set_threads(2);
        net.set_training_iters(1);
        net.train_concurrent(data.clone(), None).unwrap();
        assert!(net.pool.is_some());

        net.insert_hidden_layer(3).unwrap();
        assert!(net.pool.is_none());
        net.train_concurrent(data, None).unwrap();
        assert_eq!(net.history().len(), 2);
    }

    #[test]
    #[should_panic]
    fn single_size_panics() {
        Network::new(0).create_feed_forward(&[3], LayerKind::Sigmoid);
    }
}
