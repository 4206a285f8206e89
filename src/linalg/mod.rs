//! Dense linear algebra over [`Tensor`]s.
//!
//! Contraction takes a gemm fast path whenever both operands are matrices (or a
//! matrix and a vector) and falls back to a general but slow nested loop for
//! every other rank combination.

mod elementwise;
pub mod gemm;

pub use elementwise::{
    add, apply, hadamard, hadamard_eq, minus_eq, minus_eq_unchecked, plus_eq, plus_eq_unchecked,
    scale, subtract, times_eq,
};

use crate::error::{Error, Result};
use crate::tensor::{Tensor, TensorView};

/// Contracts the last axis of `a` with the first axis of `b`.
pub fn multiply(a: TensorView<'_>, b: TensorView<'_>, c: &mut Tensor) -> Result<()> {
    let axis_a = a.rank().saturating_sub(1);
    multiply_axes(a, axis_a, b, 0, c)
}

/// Contracts logical axis `axis_a` of `a` with logical axis `axis_b` of `b` into `c`.
///
/// The logical shape of `c` must be the remaining axes of `a` followed by the
/// remaining axes of `b`.
pub fn multiply_axes(
    a: TensorView<'_>,
    axis_a: usize,
    b: TensorView<'_>,
    axis_b: usize,
    c: &mut Tensor,
) -> Result<()> {
    let (la, lb) = (a.layout(), b.layout());
    if axis_a >= la.rank() {
        return Err(Error::BadContraction {
            axis: axis_a,
            rank: la.rank(),
        });
    }
    if axis_b >= lb.rank() {
        return Err(Error::BadContraction {
            axis: axis_b,
            rank: lb.rank(),
        });
    }

    let k = la.dim(axis_a);
    if k != lb.dim(axis_b) {
        return Err(Error::dims(
            &la.logical_shape(),
            &lb.logical_shape(),
        ));
    }

    let expected = &la.logical_shape().without(axis_a) + &lb.logical_shape().without(axis_b);
    // an empty shape holds no elements, so there is nowhere to put a scalar
    if expected.is_empty() {
        return Err(Error::RankMismatch {
            expected: 1,
            found: 0,
        });
    }
    if c.rank() != expected.rank() {
        return Err(Error::RankMismatch {
            expected: expected.rank(),
            found: c.rank(),
        });
    }
    let found = c.logical_shape();
    if found != expected {
        return Err(Error::dims(&expected, &found));
    }

    match (la.rank(), lb.rank()) {
        (2, 1) | (2, 2) => {
            gemm_path(a, axis_a, b, axis_b, c);
            Ok(())
        }
        _ => {
            general_path(a, axis_a, b, axis_b, c);
            Ok(())
        }
    }
}

/// Expresses both operands as strided matrices and hands them to gemm.
fn gemm_path(a: TensorView<'_>, axis_a: usize, b: TensorView<'_>, axis_b: usize, c: &mut Tensor) {
    let (la, lb) = (a.layout(), b.layout());

    let free_a = 1 - axis_a;
    let (m, k) = (la.dim(free_a), la.dim(axis_a));
    let (rsa, csa) = (la.stride(free_a), la.stride(axis_a));

    let (n, rsb, csb) = if lb.rank() == 2 {
        let free_b = 1 - axis_b;
        (lb.dim(free_b), lb.stride(axis_b), lb.stride(free_b))
    } else {
        (1, lb.stride(0), 1)
    };

    let lc = c.layout();
    let (rsc, csc) = if lc.rank() == 2 {
        (lc.stride(0), lc.stride(1))
    } else {
        (lc.stride(0), 1)
    };

    gemm::sgemm(
        m,
        k,
        n,
        a.data(),
        rsa,
        csa,
        b.data(),
        rsb,
        csb,
        c.data_mut(),
        rsc,
        csc,
    );
}

fn general_path(a: TensorView<'_>, axis_a: usize, b: TensorView<'_>, axis_b: usize, c: &mut Tensor) {
    let (la, lb) = (a.layout(), b.layout());
    let rest_a: Vec<usize> = (0..la.rank()).filter(|&x| x != axis_a).collect();
    let rest_b: Vec<usize> = (0..lb.rank()).filter(|&x| x != axis_b).collect();
    let dims: Vec<usize> = rest_a
        .iter()
        .map(|&x| la.dim(x))
        .chain(rest_b.iter().map(|&x| lb.dim(x)))
        .collect();

    let k = la.dim(axis_a);
    let (sa, sb) = (la.stride(axis_a), lb.stride(axis_b));
    let offsets = c.layout().offsets();
    let (ad, bd, cd) = (a.data(), b.data(), c.data_mut());

    let mut index = vec![0; dims.len()];
    for c_off in offsets {
        let a_off: usize = rest_a
            .iter()
            .enumerate()
            .map(|(i, &x)| index[i] * la.stride(x))
            .sum();
        let b_off: usize = rest_b
            .iter()
            .enumerate()
            .map(|(j, &x)| index[rest_a.len() + j] * lb.stride(x))
            .sum();

        let mut acc = 0f32;
        for p in 0..k {
            acc += ad[a_off + p * sa] * bd[b_off + p * sb];
        }
        cd[c_off] = acc;

        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            if index[axis] < dims[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}
