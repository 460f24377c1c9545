//! ROI Align with a fixed region list.

use ndarray::prelude::*;
use ndarray::NdFloat;

use crate::error::{check_shape, Result};
use crate::geometry::REGION_LEN;
use crate::op::{GradReq, RoiAlign};
use crate::Layer;

/// Pools a fixed set of regions out of each input feature map.
///
/// The input shape is `(num_images, channels, height, width)`; the output
/// shape is `(num_regions, channels, pooled_height, pooled_width)`. The
/// region list is data, not a parameter: it gets no gradient.
#[derive(Debug)]
pub struct RoiAlignLayer<A> {
    op: RoiAlign<A>,
    rois: Array2<A>,
}

impl<A: NdFloat> RoiAlignLayer<A> {
    pub fn new(op: RoiAlign<A>, rois: Array2<A>) -> Result<Self> {
        check_shape("region list", &[rois.nrows(), REGION_LEN], rois.shape())?;
        Ok(RoiAlignLayer { op, rois })
    }

    pub fn rois(&self) -> ArrayView2<'_, A> {
        self.rois.view()
    }
}

impl<A: NdFloat> Layer<A, Ix4> for RoiAlignLayer<A> {
    type Output = Ix4;

    fn output_shape(&self, input_shape: Ix4) -> Result<Ix4> {
        self.op.output_shape(input_shape, self.rois.raw_dim())
    }

    fn apply(
        &self,
        _params: ArrayView1<'_, A>,
        x: ArrayView4<'_, A>,
        y: ArrayViewMut4<'_, A>,
    ) -> Result<()> {
        self.op.forward_into(x, self.rois.view(), y)
    }

    fn derivatives(
        &self,
        _params: ArrayView1<'_, A>,
        x: ArrayView4<'_, A>,
        dz: ArrayView4<'_, A>,
        _dp: ArrayViewMut1<'_, A>,
    ) -> Result<Array4<A>> {
        let mut dx = Array4::zeros(x.raw_dim());
        self.op.backward(dz, self.rois.view(), dx.view_mut(), GradReq::Add)?;
        Ok(dx)
    }
}
