use std::fmt::Debug;

use ndarray::prelude::*;
use ndarray::{NdFloat, RemoveAxis};

use crate::error::Result;

/// A differentiable layer over arrays of element type `A`.
pub trait Layer<A, D>: Debug
where
    A: NdFloat,
    D: Dimension,
{
    /// Type of the output shape, typically one of `Ix1`, `Ix2`, etc.
    type Output: Dimension + RemoveAxis;

    /// For input of the given shape, compute the output shape.
    fn output_shape(&self, input_shape: D) -> Result<Self::Output>;

    /// Number of parameters required for this layer.
    ///
    /// The caller provides parameters to the other methods as a single flat
    /// array, which the methods will slice up and reshape into whatever they
    /// need.
    fn num_params(&self) -> usize {
        0
    }

    /// Compute the output of this layer, given the `params` and the input `x`,
    /// and store it in `y`.
    fn apply(
        &self,
        params: ArrayView1<'_, A>,
        x: ArrayView<'_, A, D>,
        y: ArrayViewMut<'_, A, Self::Output>,
    ) -> Result<()>;

    /// Given x and ∂L/∂z at x, compute partial derivatives ∂L/∂x and ∂L/∂p.
    ///
    /// Store ∂L/∂p in the out-param `dp`, a 1D vector of derivatives. Return
    /// ∂L/∂x.
    ///
    /// `dz[i]` is the partial derivative of loss with respect to `z[i]`.
    /// It reflects the effect of that output as it propagates through the rest
    /// of the pipeline.
    fn derivatives(
        &self,
        params: ArrayView1<'_, A>,
        x: ArrayView<'_, A, D>,
        dz: ArrayView<'_, A, Self::Output>,
        dp: ArrayViewMut1<'_, A>,
    ) -> Result<Array<A, D>>;
}
