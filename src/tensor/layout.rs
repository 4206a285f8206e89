use crate::error::{Error, Result};
use crate::shape::Shape;

/// Maps logical multi-indices onto a flat row-major buffer.
///
/// When `transposed` is set and the rank is at least two, the last two logical
/// axes are swapped. The buffer itself is never touched, only the mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    transposed: bool,
}

impl Layout {
    pub fn new(shape: Shape) -> Self {
        Self {
            strides: shape.strides(),
            shape,
            transposed: false,
        }
    }

    /// The physical shape of the buffer.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn len(&self) -> usize {
        self.shape.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    pub fn toggle_transposed(&mut self) {
        self.transposed = !self.transposed;
    }

    fn physical_axis(&self, axis: usize) -> usize {
        let rank = self.rank();
        if self.transposed && rank >= 2 && axis + 2 >= rank {
            // swaps rank-2 and rank-1
            2 * rank - 3 - axis
        } else {
            axis
        }
    }

    /// Logical extent of `axis`. The axis must be below the rank.
    pub fn dim(&self, axis: usize) -> usize {
        self.shape.dims()[self.physical_axis(axis)]
    }

    /// Logical stride of `axis`. The axis must be below the rank.
    pub fn stride(&self, axis: usize) -> usize {
        self.strides[self.physical_axis(axis)]
    }

    /// The shape as seen through the transposition flag.
    pub fn logical_shape(&self) -> Shape {
        if self.is_empty() {
            return Shape::empty();
        }
        let dims: Vec<usize> = (0..self.rank()).map(|a| self.dim(a)).collect();
        Shape::new(&dims)
    }

    pub fn same_logical_shape(&self, other: &Layout) -> bool {
        self.rank() == other.rank() && (0..self.rank()).all(|a| self.dim(a) == other.dim(a))
    }

    /// True when both layouts walk their buffers in the same order.
    pub fn same_physical(&self, other: &Layout) -> bool {
        self.shape == other.shape && self.transposed == other.transposed
    }

    /// A rank one tensor is a column.
    pub fn rows(&self) -> usize {
        match self.rank() {
            0 => 0,
            1 => self.dim(0),
            r => self.dim(r - 2),
        }
    }

    pub fn cols(&self) -> usize {
        match self.rank() {
            0 => 0,
            1 => 1,
            r => self.dim(r - 1),
        }
    }

    /// Flat offset of a logical multi-index. Missing trailing indices count as zero.
    pub fn offset(&self, index: &[usize]) -> Result<usize> {
        if index.len() > self.rank() {
            return Err(Error::OutOfBounds {
                axis: self.rank(),
                index: index.len() - 1,
                extent: self.rank(),
            });
        }
        if self.is_empty() {
            return Err(Error::OutOfBounds {
                axis: 0,
                index: index.first().copied().unwrap_or(0),
                extent: 0,
            });
        }
        let mut offset = 0;
        for (axis, &i) in index.iter().enumerate() {
            let extent = self.dim(axis);
            if i >= extent {
                return Err(Error::OutOfBounds {
                    axis,
                    index: i,
                    extent,
                });
            }
            offset += i * self.stride(axis);
        }
        Ok(offset)
    }

    /// Flat offsets of every element in logical row-major order.
    pub(crate) fn offsets(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        let rank = self.rank();
        if self.is_empty() {
            return out;
        }
        let mut index = vec![0; rank];
        let mut offset = 0;
        'outer: loop {
            out.push(offset);
            let mut axis = rank;
            loop {
                if axis == 0 {
                    break 'outer;
                }
                axis -= 1;
                index[axis] += 1;
                offset += self.stride(axis);
                if index[axis] < self.dim(axis) {
                    break;
                }
                offset -= self.stride(axis) * index[axis];
                index[axis] = 0;
            }
        }
        out
    }

    /// Borrows `data` under this layout without copying it.
    /// The buffer must hold exactly as many elements as the layout describes.
    pub fn view<'a>(&'a self, data: &'a [f32]) -> Result<TensorView<'a>> {
        if data.len() != self.len() {
            let found = if data.is_empty() {
                Shape::empty()
            } else {
                Shape::vector(data.len())
            };
            return Err(Error::dims(&self.shape, &found));
        }
        Ok(TensorView { data, layout: self })
    }
}

/// A borrowed, read-only tensor. Lives no longer than the buffer it points into.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: &'a [f32],
    layout: &'a Layout,
}

impl<'a> TensorView<'a> {
    pub(crate) fn new(data: &'a [f32], layout: &'a Layout) -> Self {
        debug_assert_eq!(data.len(), layout.len());
        Self { data, layout }
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    pub fn layout(&self) -> &'a Layout {
        self.layout
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

    pub fn at(&self, index: &[usize]) -> Result<f32> {
        Ok(self.data[self.layout.offset(index)?])
    }
}
