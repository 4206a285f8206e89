use super::Network;
use crate::error::{Error, Result};
use crate::layers::Neuron;
use crate::shape::Shape;
use crate::storage::TensorSlot;
use crate::tensor::Tensor;

use anyhow::Context;
use tracing::debug;

use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

const HEADER: u32 = 1992;
const FOOTER: u32 = 10101;

impl Network {
    /// Writes the layer sizes, every weight matrix and every bias column as
    /// whitespace separated text. Tied weights are written once per layer.
    pub fn save_network(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let text = self
            .encode()
            .with_context(|| format!("Failed to save network to {}", path.display()))?;
        fs::write(path, text)
            .with_context(|| format!("Failed to save network to {}", path.display()))?;
        debug!(path = %path.display(), "Saved network");
        Ok(())
    }

    /// Replaces the topology with a plain feed forward chain read from `path`.
    /// The whole file is validated first, on error the network is left as it was.
    pub fn load_network(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let context = || format!("Failed to load network from {}", path.display());
        let text = fs::read_to_string(path).with_context(context)?;
        let saved = decode(&text).with_context(context)?;

        self.create_feed_forward(&saved.neurons, self.kind);
        let tensors = saved.weights.iter().zip(&saved.biases);
        for (layer, (weights, biases)) in self.layers.iter().zip(tensors) {
            layer
                .tensor(TensorSlot::Weights as usize)?
                .write()
                .data_mut()
                .copy_from_slice(weights.data());
            layer
                .tensor(TensorSlot::Biases as usize)?
                .write()
                .data_mut()
                .copy_from_slice(biases.data());
        }
        debug!(path = %path.display(), neurons = ?self.neurons, "Loaded network");
        Ok(())
    }

    fn encode(&self) -> Result<String> {
        if !self.is_initialized() {
            return Err(Error::Uninitialized);
        }
        let mut out = String::new();
        let sizes: Vec<String> = self.neurons.iter().map(usize::to_string).collect();
        // fmt::Write into a String cannot fail
        let _ = writeln!(out, "{} {} {}", HEADER, self.neurons.len(), sizes.join(" "));

        for layer in &self.layers {
            let mut weights = layer.tensor(TensorSlot::Weights as usize)?.read().clone();
            if layer.is_transposed() {
                weights.transpose();
            }
            write_tensor(&mut out, &weights);
        }
        for layer in &self.layers {
            let biases = layer.tensor(TensorSlot::Biases as usize)?;
            write_tensor(&mut out, &biases.read());
        }
        let _ = writeln!(out, "{}", FOOTER);
        Ok(out)
    }
}

/// `cols rows` followed by the values in logical row-major order.
fn write_tensor(out: &mut String, tensor: &Tensor) {
    let _ = write!(out, "{} {}", tensor.cols(), tensor.rows());
    let data = tensor.data();
    for offset in tensor.layout().offsets() {
        let _ = write!(out, " {}", data[offset]);
    }
    out.push('\n');
}

#[derive(Debug)]
struct Saved {
    neurons: Vec<usize>,
    weights: Vec<Tensor>,
    biases: Vec<Tensor>,
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self
            .0
            .next()
            .ok_or_else(|| Error::Format(format!("unexpected end of file, expected {}", what)))?;
        token
            .parse()
            .map_err(|_| Error::Format(format!("expected {}, found '{}'", what, token)))
    }

    fn magic(&mut self, expected: u32) -> Result<()> {
        match self.0.next() {
            Some(token) if token.parse::<u32>() == Ok(expected) => Ok(()),
            found => Err(Error::BadMagic {
                expected,
                found: found.unwrap_or("end of file").to_owned(),
            }),
        }
    }

    fn tensor(&mut self, shape: Shape) -> Result<Tensor> {
        let cols: usize = self.next("a width")?;
        let rows: usize = self.next("a height")?;
        let found = Shape::matrix(rows.max(1), cols.max(1));
        if rows != shape.dims()[0] || cols != shape.dims()[1] {
            return Err(Error::dims(&shape, &found));
        }
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Format(format!("a {}x{} tensor is too large", rows, cols)))?;
        let data = (0..len)
            .map(|_| self.next("a value"))
            .collect::<Result<Vec<f32>>>()?;
        Tensor::from_vec(shape, data)
    }
}

fn decode(text: &str) -> Result<Saved> {
    let mut tokens = Tokens(text.split_whitespace());
    tokens.magic(HEADER)?;

    let count: usize = tokens.next("the layer count")?;
    if count < 2 {
        return Err(Error::Format(format!(
            "a network needs at least two layer sizes, found {}",
            count
        )));
    }
    let neurons = (0..count)
        .map(|_| tokens.next("a layer size"))
        .collect::<Result<Vec<usize>>>()?;
    if neurons.contains(&0) {
        return Err(Error::Format("layer sizes must be positive".into()));
    }
    for pair in neurons.windows(2) {
        if pair[0].checked_mul(pair[1]).is_none() {
            return Err(Error::Format(format!(
                "a {}x{} layer is too large",
                pair[1], pair[0]
            )));
        }
    }

    let mut weights = Vec::with_capacity(count - 1);
    for pair in neurons.windows(2) {
        weights.push(tokens.tensor(Shape::matrix(pair[1], pair[0]))?);
    }
    let mut biases = Vec::with_capacity(count - 1);
    for &size in &neurons[1..] {
        biases.push(tokens.tensor(Shape::matrix(size, 1))?);
    }

    tokens.magic(FOOTER)?;
    if let Some(extra) = tokens.0.next() {
        return Err(Error::Format(format!("trailing data after footer: '{}'", extra)));
    }
    Ok(Saved {
        neurons,
        weights,
        biases,
    })
}
