//! ROI Align as an operator a host framework can drive: shape inference,
//! output allocation, and gradient write requests.

use ndarray::prelude::*;
use ndarray::NdFloat;
use num_traits::NumCast;
use tracing::debug;

use crate::error::{check_shape, Result, RoiAlignError};
use crate::geometry::{resolve_regions, REGION_LEN};
use crate::kernel::{roi_align_backward_acc, roi_align_forward};
use crate::params::RoiAlignParams;

/// What the caller wants done with an input gradient buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradReq {
    /// Leave the buffer alone.
    Null,
    /// Replace the buffer's contents with the gradient.
    #[default]
    Write,
    /// Add the gradient to the buffer's contents.
    Add,
}

/// ROI Align for element type `A`.
#[derive(Debug, Clone, Copy)]
pub struct RoiAlign<A> {
    params: RoiAlignParams,
    spatial_scale: A,
}

impl<A: NdFloat> RoiAlign<A> {
    pub fn new(params: RoiAlignParams) -> Result<Self> {
        let spatial_scale = <A as NumCast>::from(params.spatial_scale()).ok_or_else(|| {
            RoiAlignError::InvalidParam(format!(
                "spatial scale {} not representable",
                params.spatial_scale()
            ))
        })?;
        Ok(RoiAlign {
            params,
            spatial_scale,
        })
    }

    pub fn params(&self) -> &RoiAlignParams {
        &self.params
    }

    /// For a feature map of shape `data_shape` and a region list of shape
    /// `rois_shape`, compute the pooled output shape.
    pub fn output_shape(&self, data_shape: Ix4, rois_shape: Ix2) -> Result<Ix4> {
        let (_, channels, _, _) = data_shape.into_pattern();
        let (num_rois, len) = rois_shape.into_pattern();
        check_shape("region list", &[num_rois, REGION_LEN], &[num_rois, len])?;
        let pooled = self.params.pooled_size();
        Ok(Ix4(num_rois, channels, pooled.height, pooled.width))
    }

    /// Pool `data` over every region, returning a freshly allocated output.
    pub fn forward(&self, data: ArrayView4<'_, A>, rois: ArrayView2<'_, A>) -> Result<Array4<A>> {
        let mut out = Array4::zeros(self.output_shape(data.raw_dim(), rois.raw_dim())?);
        roi_align_forward(out.view_mut(), data, rois, self.spatial_scale)?;
        Ok(out)
    }

    /// Pool `data` into a caller-provided buffer.
    pub fn forward_into(
        &self,
        data: ArrayView4<'_, A>,
        rois: ArrayView2<'_, A>,
        out: ArrayViewMut4<'_, A>,
    ) -> Result<()> {
        let expected = self.output_shape(data.raw_dim(), rois.raw_dim())?;
        check_shape("pooled output", expected.slice(), out.shape())?;
        roi_align_forward(out, data, rois, self.spatial_scale)
    }

    /// Propagate `grad_out` back into `grad_in` according to `req`.
    ///
    /// With `GradReq::Write` the buffer is zeroed only after all shapes and
    /// regions have been validated, so an error leaves it untouched.
    pub fn backward(
        &self,
        grad_out: ArrayView4<'_, A>,
        rois: ArrayView2<'_, A>,
        mut grad_in: ArrayViewMut4<'_, A>,
        req: GradReq,
    ) -> Result<()> {
        let expected = self.output_shape(grad_in.raw_dim(), rois.raw_dim())?;
        check_shape("output gradient", expected.slice(), grad_out.shape())?;
        match req {
            GradReq::Null => {
                debug!("roi align backward skipped");
                Ok(())
            }
            GradReq::Add => roi_align_backward_acc(grad_in, grad_out, rois, self.spatial_scale),
            GradReq::Write => {
                let batch_size = grad_in.len_of(Axis(0));
                resolve_regions(rois, self.spatial_scale, batch_size)?;
                grad_in.fill(A::zero());
                roi_align_backward_acc(grad_in, grad_out, rois, self.spatial_scale)
            }
        }
    }

    /// The gradient with respect to the region list, which is always zero.
    pub fn region_grad(&self, rois: ArrayView2<'_, A>) -> Array2<A> {
        Array2::zeros(rois.raw_dim())
    }
}
