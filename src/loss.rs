use crate::error::{Error, Result};
use crate::linalg;
use crate::tensor::{Tensor, TensorView};

pub trait LossFunc {
    /// Cost of a single sample.
    fn cost(output: TensorView<'_>, target: TensorView<'_>) -> Result<f32>;
    /// Error signal at the output layer, written into `delta`.
    fn output_error(output: TensorView<'_>, target: TensorView<'_>, delta: &mut Tensor)
        -> Result<()>;
}

/// Summed squared error. The output error is the plain difference
/// `output - target`, without the derivative of the output activation.
#[derive(Debug, Clone, Copy)]
pub struct SquaredError;

impl LossFunc for SquaredError {
    fn cost(output: TensorView<'_>, target: TensorView<'_>) -> Result<f32> {
        let (lo, lt) = (output.layout(), target.layout());
        if !lo.same_logical_shape(lt) {
            return Err(Error::dims(&lo.logical_shape(), &lt.logical_shape()));
        }
        let sq = |(o, t): (&f32, &f32)| (t - o) * (t - o);
        if lo.same_physical(lt) {
            Ok(output.data().iter().zip(target.data()).map(sq).sum())
        } else {
            let (od, td) = (output.data(), target.data());
            Ok(lo
                .offsets()
                .into_iter()
                .zip(lt.offsets())
                .map(|(o, t)| sq((&od[o], &td[t])))
                .sum())
        }
    }

    fn output_error(
        output: TensorView<'_>,
        target: TensorView<'_>,
        delta: &mut Tensor,
    ) -> Result<()> {
        linalg::subtract(output, target, delta)
    }
}
