use crate::error::{Error, Result};
use crate::tensor::{Layout, Tensor, TensorView};

fn check(expected: &Layout, found: &Layout) -> Result<()> {
    if expected.same_logical_shape(found) {
        Ok(())
    } else {
        Err(Error::dims(&expected.logical_shape(), &found.logical_shape()))
    }
}

fn zip_with<F>(a: TensorView<'_>, b: TensorView<'_>, c: &mut Tensor, f: F) -> Result<()>
where
    F: Fn(f32, f32) -> f32,
{
    check(a.layout(), b.layout())?;
    check(a.layout(), c.layout())?;

    if a.layout().same_physical(b.layout()) && a.layout().same_physical(c.layout()) {
        for ((c, a), b) in c.data_mut().iter_mut().zip(a.data()).zip(b.data()) {
            *c = f(*a, *b);
        }
    } else {
        let (ao, bo, co) = (
            a.layout().offsets(),
            b.layout().offsets(),
            c.layout().offsets(),
        );
        let (a, b, c) = (a.data(), b.data(), c.data_mut());
        for ((ai, bi), ci) in ao.into_iter().zip(bo).zip(co) {
            c[ci] = f(a[ai], b[bi]);
        }
    }
    Ok(())
}

fn update_with<F>(c: &mut Tensor, b: TensorView<'_>, f: F) -> Result<()>
where
    F: Fn(f32, f32) -> f32,
{
    check(c.layout(), b.layout())?;

    if c.layout().same_physical(b.layout()) {
        for (c, b) in c.data_mut().iter_mut().zip(b.data()) {
            *c = f(*c, *b);
        }
    } else {
        let (bo, co) = (b.layout().offsets(), c.layout().offsets());
        let (b, c) = (b.data(), c.data_mut());
        for (bi, ci) in bo.into_iter().zip(co) {
            c[ci] = f(c[ci], b[bi]);
        }
    }
    Ok(())
}

/// `c = a + b`
pub fn add(a: TensorView<'_>, b: TensorView<'_>, c: &mut Tensor) -> Result<()> {
    zip_with(a, b, c, |x, y| x + y)
}

/// `c = a - b`
pub fn subtract(a: TensorView<'_>, b: TensorView<'_>, c: &mut Tensor) -> Result<()> {
    zip_with(a, b, c, |x, y| x - y)
}

/// `c = a ⊙ b`
pub fn hadamard(a: TensorView<'_>, b: TensorView<'_>, c: &mut Tensor) -> Result<()> {
    zip_with(a, b, c, |x, y| x * y)
}

/// `c = f(a)` elementwise.
pub fn apply<F>(a: TensorView<'_>, f: F, c: &mut Tensor) -> Result<()>
where
    F: Fn(f32) -> f32,
{
    check(a.layout(), c.layout())?;

    if a.layout().same_physical(c.layout()) {
        for (c, a) in c.data_mut().iter_mut().zip(a.data()) {
            *c = f(*a);
        }
    } else {
        let (ao, co) = (a.layout().offsets(), c.layout().offsets());
        let (a, c) = (a.data(), c.data_mut());
        for (ai, ci) in ao.into_iter().zip(co) {
            c[ci] = f(a[ai]);
        }
    }
    Ok(())
}

/// `c = m * a`
pub fn scale(a: TensorView<'_>, m: f32, c: &mut Tensor) -> Result<()> {
    apply(a, |x| m * x, c)
}

/// `c += mult * b`
pub fn plus_eq(c: &mut Tensor, b: TensorView<'_>, mult: f32) -> Result<()> {
    update_with(c, b, |x, y| x + mult * y)
}

/// `c -= mult * b`
pub fn minus_eq(c: &mut Tensor, b: TensorView<'_>, mult: f32) -> Result<()> {
    update_with(c, b, |x, y| x - mult * y)
}

/// `c ⊙= b`
pub fn hadamard_eq(c: &mut Tensor, b: TensorView<'_>) -> Result<()> {
    update_with(c, b, |x, y| x * y)
}

/// `c *= m`, always valid.
pub fn times_eq(c: &mut Tensor, m: f32) {
    c.data_mut().iter_mut().for_each(|x| *x *= m);
}

/// `c += mult * b` walking both buffers flat.
///
/// Shapes and transposition flags are not looked at, only the buffer lengths.
/// Callers must know both operands share one physical layout.
pub fn plus_eq_unchecked(c: &mut Tensor, b: TensorView<'_>, mult: f32) {
    assert_eq!(c.len(), b.len());
    for (c, b) in c.data_mut().iter_mut().zip(b.data()) {
        *c += mult * *b;
    }
}

/// `c -= mult * b` walking both buffers flat, see [`plus_eq_unchecked`].
pub fn minus_eq_unchecked(c: &mut Tensor, b: TensorView<'_>, mult: f32) {
    assert_eq!(c.len(), b.len());
    for (c, b) in c.data_mut().iter_mut().zip(b.data()) {
        *c -= mult * *b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn tensor(rows: usize, cols: usize, data: &[f32]) -> Tensor {
        Tensor::from_vec(Shape::matrix(rows, cols), data.to_vec()).unwrap()
    }

    #[test]
    fn elementwise_ops() {
        let a = tensor(2, 2, &[1., 2., 3., 4.]);
        let b = tensor(2, 2, &[4., 3., 2., 1.]);
        let mut c = Tensor::new(Shape::matrix(2, 2));

        add(a.view(), b.view(), &mut c).unwrap();
        assert_eq!(c.data(), &[5., 5., 5., 5.]);
        subtract(a.view(), b.view(), &mut c).unwrap();
        assert_eq!(c.data(), &[-3., -1., 1., 3.]);
        hadamard(a.view(), b.view(), &mut c).unwrap();
        assert_eq!(c.data(), &[4., 6., 6., 4.]);
        scale(a.view(), 0.5, &mut c).unwrap();
        assert_eq!(c.data(), &[0.5, 1., 1.5, 2.]);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let a = tensor(2, 2, &[1., 2., 3., 4.]);
        let b = tensor(1, 4, &[1., 2., 3., 4.]);
        let mut c = Tensor::new(Shape::matrix(2, 2));
        let err = add(a.view(), b.view(), &mut c).unwrap_err();
        assert!(matches!(err, Error::DimsMismatch { .. }));
        assert!(subtract(a.view(), b.view(), &mut c).is_err());
        assert!(hadamard(a.view(), b.view(), &mut c).is_err());
        assert!(plus_eq(&mut c, b.view(), 1.).is_err());
        // untouched on failure
        assert_eq!(c.sum(), 0.);
    }

    #[test]
    fn transposed_operand_goes_through_logical_indices() {
        let a = tensor(2, 3, &[1., 2., 3., 4., 5., 6.]);
        let mut b = tensor(3, 2, &[1., 4., 2., 5., 3., 6.]);
        b.transpose();
        let mut c = Tensor::new(Shape::matrix(2, 3));
        subtract(a.view(), b.view(), &mut c).unwrap();
        assert_eq!(c.sum(), 0.);

        let mut acc = a.clone();
        minus_eq(&mut acc, b.view(), 1.).unwrap();
        assert_eq!(acc.sum(), 0.);
    }

    #[test]
    fn in_place_updates() {
        let mut c = tensor(1, 3, &[1., 1., 1.]);
        let b = tensor(1, 3, &[1., 2., 3.]);
        plus_eq(&mut c, b.view(), 2.).unwrap();
        assert_eq!(c.data(), &[3., 5., 7.]);
        minus_eq(&mut c, b.view(), 1.).unwrap();
        assert_eq!(c.data(), &[2., 3., 4.]);
        hadamard_eq(&mut c, b.view()).unwrap();
        assert_eq!(c.data(), &[2., 6., 12.]);
        times_eq(&mut c, 0.5);
        assert_eq!(c.data(), &[1., 3., 6.]);
        plus_eq_unchecked(&mut c, b.view(), 1.);
        minus_eq_unchecked(&mut c, b.view(), 2.);
        assert_eq!(c.data(), &[0., 1., 3.]);
    }
}
