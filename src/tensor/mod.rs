mod layout;

pub use layout::{Layout, TensorView};

use crate::error::{Error, Result};
use crate::shape::Shape;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use std::fmt::{self, Display};

/// A dense tensor owning a flat row-major buffer.
///
/// Cloning deep-copies the buffer. Transposition only flips a flag in the
/// layout, see [`Layout`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tensor {
    data: Vec<f32>,
    layout: Layout,
}

impl Tensor {
    /// Zero filled tensor.
    pub fn new(shape: Shape) -> Self {
        Self {
            data: vec![0.; shape.total()],
            layout: Layout::new(shape),
        }
    }

    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.total() {
            return Err(Error::BadReshape {
                from: data.len(),
                to: shape.total(),
            });
        }
        Ok(Self {
            data,
            layout: Layout::new(shape),
        })
    }

    /// A `(n, 1)` column, the shape samples and activations use.
    pub fn column(values: &[f32]) -> Self {
        Self {
            data: values.to_vec(),
            layout: Layout::new(Shape::matrix(values.len(), 1)),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Physical shape of the buffer.
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn logical_shape(&self) -> Shape {
        self.layout.logical_shape()
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn view(&self) -> TensorView<'_> {
        TensorView::new(&self.data, &self.layout)
    }

    pub fn at(&self, index: &[usize]) -> Result<f32> {
        Ok(self.data[self.layout.offset(index)?])
    }

    pub fn at_mut(&mut self, index: &[usize]) -> Result<&mut f32> {
        let offset = self.layout.offset(index)?;
        Ok(&mut self.data[offset])
    }

    pub fn set(&mut self, index: &[usize], value: f32) -> Result<()> {
        *self.at_mut(index)? = value;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.layout.rows()
    }

    pub fn cols(&self) -> usize {
        self.layout.cols()
    }

    pub fn is_transposed(&self) -> bool {
        self.layout.is_transposed()
    }

    /// Flips the transposition flag. The buffer is left alone.
    pub fn transpose(&mut self) -> &mut Self {
        self.layout.toggle_transposed();
        self
    }

    /// Reallocates for `shape`. Previous contents are dropped.
    pub fn resize(&mut self, shape: Shape) {
        *self = Tensor::new(shape);
    }

    /// Reinterprets the buffer under `shape` and clears the transposition flag.
    pub fn reshape(&mut self, shape: Shape) -> Result<()> {
        if shape.total() != self.data.len() {
            return Err(Error::BadReshape {
                from: self.data.len(),
                to: shape.total(),
            });
        }
        self.layout = Layout::new(shape);
        Ok(())
    }

    /// Uniform noise in `[-scale, scale]`.
    pub fn random<R: Rng + ?Sized>(&mut self, scale: f32, rng: &mut R) {
        let dist = Uniform::new_inclusive(-scale, scale);
        for x in self.data.iter_mut() {
            *x = dist.sample(rng);
        }
    }

    pub fn zero(&mut self) {
        self.fill(0.);
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Index of the largest element in logical order, the first one on ties.
    pub fn argmax(&self) -> Option<usize> {
        argmax(self.view())
    }

    fn write_axis(&self, f: &mut fmt::Formatter<'_>, axis: usize, offset: usize) -> fmt::Result {
        f.write_str("{")?;
        for i in 0..self.layout.dim(axis) {
            if i > 0 {
                f.write_str(",")?;
            }
            let offset = offset + i * self.layout.stride(axis);
            if axis + 1 == self.rank() {
                write!(f, "{}", self.data[offset])?;
            } else {
                self.write_axis(f, axis + 1, offset)?;
            }
        }
        f.write_str("}")
    }
}

pub(crate) fn argmax(view: TensorView<'_>) -> Option<usize> {
    let data = view.data();
    let mut best: Option<(usize, f32)> = None;
    let mut visit = |i: usize, v: f32| match best {
        Some((_, b)) if b >= v => {}
        _ => best = Some((i, v)),
    };
    if view.layout().is_transposed() {
        for (i, off) in view.layout().offsets().into_iter().enumerate() {
            visit(i, data[off]);
        }
    } else {
        for (i, v) in data.iter().enumerate() {
            visit(i, *v);
        }
    }
    best.map(|(i, _)| i)
}

impl Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        self.write_axis(f, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn counting(rows: usize, cols: usize) -> Tensor {
        let data = (0..rows * cols).map(|x| x as f32).collect();
        Tensor::from_vec(Shape::matrix(rows, cols), data).unwrap()
    }

    #[test]
    fn write_then_read() {
        let mut t = Tensor::new(Shape::new(&[2, 3, 4]));
        t.set(&[1, 2, 3], 7.5).unwrap();
        assert_eq!(t.at(&[1, 2, 3]), Ok(7.5));
        assert_eq!(t.data()[23], 7.5);
        assert!(t.set(&[2, 0, 0], 1.).is_err());
        assert!(t.set(&[0, 3, 0], 1.).is_err());
    }

    #[test]
    fn empty_tensor_has_no_elements_to_read() {
        let mut t = Tensor::new(Shape::empty());
        assert!(matches!(t.at(&[]), Err(Error::OutOfBounds { extent: 0, .. })));
        assert!(t.set(&[], 1.).is_err());
        assert!(t.view().at(&[]).is_err());
        assert!(Tensor::default().at(&[]).is_err());
    }

    #[test]
    fn transposing_twice_is_identity() {
        let mut t = counting(2, 3);
        let original = t.clone();
        t.transpose();
        assert_eq!((t.rows(), t.cols()), (3, 2));
        assert_eq!(t.at(&[2, 1]), original.at(&[1, 2]));
        t.transpose();
        assert_eq!((t.rows(), t.cols()), (2, 3));
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(t.at(&[i, j]), original.at(&[i, j]));
            }
        }
        assert_eq!(t, original);
    }

    #[test]
    fn reshape_keeps_buffer() {
        let mut t = counting(2, 3);
        t.reshape(Shape::matrix(3, 2)).unwrap();
        assert_eq!(t.at(&[2, 1]), Ok(5.));
        assert_eq!(
            t.reshape(Shape::matrix(4, 2)),
            Err(Error::BadReshape { from: 6, to: 8 })
        );
    }

    #[test]
    fn resize_discards_contents() {
        let mut t = counting(2, 2);
        t.resize(Shape::vector(3));
        assert_eq!(t.data(), &[0., 0., 0.]);
    }

    #[test]
    fn reductions() {
        let t = Tensor::from_vec(Shape::vector(4), vec![3., -4., 0., 1.]).unwrap();
        assert_eq!(t.sum(), 0.);
        assert_eq!(t.max(), 3.);
        assert_eq!(t.min(), -4.);
        assert!((t.norm() - 26f32.sqrt()).abs() < 1e-6);
        assert_eq!(t.argmax(), Some(0));
    }

    #[test]
    fn random_stays_in_range() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut t = Tensor::new(Shape::matrix(10, 10));
        t.random(0.5, &mut rng);
        assert!(t.data().iter().all(|x| x.abs() <= 0.5));
        assert!(t.norm() > 0.);
        t.zero();
        assert_eq!(t.sum(), 0.);
    }

    #[test]
    fn display_follows_logical_view() {
        let mut t = counting(2, 2);
        assert_eq!(t.to_string(), "{{0,1},{2,3}}");
        t.transpose();
        assert_eq!(t.to_string(), "{{0,2},{1,3}}");
        assert_eq!(Tensor::default().to_string(), "{}");
    }
}
