//! Strided single precision `C = A·B`.
//!
//! Every operand is described by a row stride and a column stride, so a
//! transposed operand or a contraction over its first axis is only a matter of
//! swapping the two strides. No operand is ever copied.

/// `C (m×n) = A (m×k) · B (k×n)`, overwriting `C`.
#[allow(clippy::too_many_arguments)]
pub fn sgemm(
    m: usize,
    k: usize,
    n: usize,
    a: &[f32],
    rsa: usize,
    csa: usize,
    b: &[f32],
    rsb: usize,
    csb: usize,
    c: &mut [f32],
    rsc: usize,
    csc: usize,
) {
    if m == 0 || n == 0 || k == 0 {
        return;
    }
    // the kernel reads through raw pointers, keep every access inside the slices
    assert!((m - 1) * rsa + (k - 1) * csa < a.len());
    assert!((k - 1) * rsb + (n - 1) * csb < b.len());
    assert!((m - 1) * rsc + (n - 1) * csc < c.len());

    #[cfg(feature = "matrixmultiply")]
    unsafe {
        // SAFETY: the asserts above bound every offset the kernel touches
        matrixmultiply::sgemm(
            m,
            k,
            n,
            1.,
            a.as_ptr(),
            rsa as isize,
            csa as isize,
            b.as_ptr(),
            rsb as isize,
            csb as isize,
            0.,
            c.as_mut_ptr(),
            rsc as isize,
            csc as isize,
        );
    }

    #[cfg(not(feature = "matrixmultiply"))]
    sgemm_naive(m, k, n, a, rsa, csa, b, rsb, csb, c, rsc, csc);
}

/// Triple loop reference of [`sgemm`].
#[allow(clippy::too_many_arguments)]
#[cfg_attr(all(feature = "matrixmultiply", not(test)), allow(dead_code))]
pub(crate) fn sgemm_naive(
    m: usize,
    k: usize,
    n: usize,
    a: &[f32],
    rsa: usize,
    csa: usize,
    b: &[f32],
    rsb: usize,
    csb: usize,
    c: &mut [f32],
    rsc: usize,
    csc: usize,
) {
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0f32;
            for p in 0..k {
                acc = a[i * rsa + p * csa].mul_add(b[p * rsb + j * csb], acc);
            }
            c[i * rsc + j * csc] = acc;
        }
    }
}
