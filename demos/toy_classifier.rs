//! Trains a small classifier on three noisy clusters and reports its accuracy.
//!
//! Run with `RUST_LOG=debug` for per-iteration output.

use rusty_backprop::helpers::grayscale;
use rusty_backprop::initializer::Init;
use rusty_backprop::layers::LayerKind;
use rusty_backprop::optimizer::Momentum;
use rusty_backprop::trainer::{Dataset, LogFile, TrainingConfig};
use rusty_backprop::{Network, Tensor};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

fn clusters(per_class: usize, rng: &mut SmallRng) -> rusty_backprop::Result<Dataset> {
    let centres = [[1., 0., 0., 0.5], [0., 1., 0., 0.5], [0., 0., 1., 0.5]];
    let noise = Uniform::new_inclusive(-0.2f32, 0.2);
    let mut inputs = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..per_class {
        for (label, centre) in centres.iter().enumerate() {
            let values: Vec<f32> = centre.iter().map(|c| c + noise.sample(rng)).collect();
            inputs.push(Tensor::column(&values));
            labels.push(label);
        }
    }
    Dataset::from_labels(inputs, &labels, centres.len())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut rng = SmallRng::seed_from_u64(2024);
    let train = Arc::new(clusters(200, &mut rng)?);
    let test = clusters(50, &mut rng)?;

    let config = TrainingConfig {
        rate: 0.5,
        minibatch: 10,
        iterations: 30,
        rate_decay: Some(0.9),
        display: true,
        ..TrainingConfig::default()
    };
    let mut net = Network::new(7).with_config(config);
    net.set_initializer(Init::Xavier);
    net.create_feed_forward(&[4, 8, 3], LayerKind::SigmoidMomentum(Momentum::new(0.1)));
    net.set_logger(LogFile::new("toy_classifier.log")?);
    net.train_concurrent(train.clone(), Some(&test))?;

    println!("test accuracy: {:.3}", net.evaluate_accuracy(&test)?);
    net.save_network("toy_classifier.net")?;
    net.history().save_json("toy_classifier_history.json")?;

    let output = net.feed_forward(&test.inputs[0])?;
    println!("first test sample activations: {:?}", grayscale(&output));
    Ok(())
}
