use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display};
use std::ops::Add;

/// The extents of a tensor. A shape without axes is empty and holds no elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Panics if any extent is zero.
    pub fn new(dims: &[usize]) -> Self {
        assert!(
            dims.iter().all(|&d| d > 0),
            "Shape extents must be positive, got {:?}",
            dims
        );
        Self {
            dims: dims.to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn vector(len: usize) -> Self {
        Self::new(&[len])
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self::new(&[rows, cols])
    }

    /// Extent of `axis`.
    pub fn at(&self, axis: usize) -> Result<usize> {
        self.dims.get(axis).copied().ok_or(Error::OutOfBounds {
            axis,
            index: axis,
            extent: self.rank(),
        })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn total(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.dims.iter().product()
        }
    }

    /// Row-major strides, the last axis is contiguous.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Copy of the shape with `axis` removed.
    pub(crate) fn without(&self, axis: usize) -> Shape {
        let dims = self
            .dims
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != axis)
            .map(|(_, d)| *d)
            .collect();
        Shape { dims }
    }
}

impl Add for &Shape {
    type Output = Shape;

    fn add(self, rhs: &Shape) -> Shape {
        let mut dims = self.dims.clone();
        dims.extend_from_slice(&rhs.dims);
        Shape { dims }
    }
}

impl Add for Shape {
    type Output = Shape;

    fn add(self, rhs: Shape) -> Shape {
        &self + &rhs
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", d)?;
        }
        f.write_str("}")
    }
}
