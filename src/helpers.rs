use crate::error::{Error, Result};
use crate::tensor::Tensor;

use rand::seq::SliceRandom;
use rand::Rng;

/// Sample order for one pass over `len` samples, shuffled when an rng is given.
pub fn sample_order<R: Rng + ?Sized>(len: usize, rng: Option<&mut R>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if let Some(rng) = rng {
        order.shuffle(rng);
    }
    order
}

/// `(classes, 1)` column with a one at `label`.
pub fn one_hot(label: usize, classes: usize) -> Result<Tensor> {
    let mut values = vec![0.; classes];
    let slot = values.get_mut(label).ok_or(Error::OutOfBounds {
        axis: 0,
        index: label,
        extent: classes,
    })?;
    *slot = 1.;
    Ok(Tensor::column(&values))
}

/// Grayscale pixels for an image sink, in logical row-major order.
/// Values are clamped to `[0, 1]` and scaled to `[0, 255]`.
pub fn grayscale(image: &Tensor) -> Vec<u8> {
    let data = image.data();
    image
        .layout()
        .offsets()
        .into_iter()
        .map(|i| (data[i].max(0.).min(1.) * 255.).round() as u8)
        .collect()
}
