//! Entry points for hosts that pass flat buffers and dimensions instead of
//! arrays.
//!
//! All buffers are dense and row-major. The region list holds
//! `num_rois * 5` values.

use ndarray::prelude::*;
use ndarray::NdFloat;

use crate::array_util::{view, view_mut};
use crate::error::Result;
use crate::geometry::REGION_LEN;
use crate::kernel::{roi_align_backward_acc, roi_align_forward};
use crate::params::PooledSize;

/// Dimensions of a feature map: `(batch, channels, height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureShape {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FeatureShape {
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        FeatureShape {
            batch,
            channels,
            height,
            width,
        }
    }

    fn dim(&self) -> Ix4 {
        Ix4(self.batch, self.channels, self.height, self.width)
    }

    fn pooled_dim(&self, num_rois: usize, pooled: PooledSize) -> Ix4 {
        Ix4(num_rois, self.channels, pooled.height, pooled.width)
    }
}

/// Fill `out`, a `(num_rois, channels, pooled.height, pooled.width)`
/// buffer, with the pooled regions of `data`.
pub fn forward_raw<A: NdFloat>(
    out: &mut [A],
    data: &[A],
    shape: FeatureShape,
    rois: &[A],
    num_rois: usize,
    pooled: PooledSize,
    spatial_scale: A,
) -> Result<()> {
    let data = view("feature map", data, shape.dim())?;
    let rois = view("region list", rois, Ix2(num_rois, REGION_LEN))?;
    let out = view_mut("pooled output", out, shape.pooled_dim(num_rois, pooled))?;
    roi_align_forward(out, data, rois, spatial_scale)
}

/// Add the gradient of `grad_out` with respect to the feature map into
/// `grad_in`. `grad_in` is never cleared.
pub fn backward_raw<A: NdFloat>(
    grad_in: &mut [A],
    grad_out: &[A],
    shape: FeatureShape,
    rois: &[A],
    num_rois: usize,
    pooled: PooledSize,
    spatial_scale: A,
) -> Result<()> {
    let grad_out = view("output gradient", grad_out, shape.pooled_dim(num_rois, pooled))?;
    let rois = view("region list", rois, Ix2(num_rois, REGION_LEN))?;
    let grad_in = view_mut("input gradient", grad_in, shape.dim())?;
    roi_align_backward_acc(grad_in, grad_out, rois, spatial_scale)
}
