//! The ROI Align forward and backward kernels.
//!
//! Feature maps have shape `(batch, channels, height, width)`. The region
//! list has shape `(num_regions, 5)`, one `[batch_index, x1, y1, x2, y2]` row
//! per region. Pooled output has shape
//! `(num_regions, channels, pooled_height, pooled_width)`.
//!
//! Both kernels validate every shape and every batch index before writing
//! anything.

use ndarray::prelude::*;
use ndarray::NdFloat;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{check_shape, Result};
use crate::geometry::{resolve_regions, Region, SampleGrid, REGION_LEN};
use crate::params::PooledSize;

/// Regions paired with their sample grids.
fn plan_regions<A: NdFloat>(
    rois: ArrayView2<'_, A>,
    spatial_scale: A,
    feature_shape: (usize, usize, usize, usize),
    pooled: PooledSize,
) -> Result<Vec<(Region<A>, SampleGrid<A>)>> {
    let (batch_size, _, height, width) = feature_shape;
    check_shape("region list", &[rois.nrows(), REGION_LEN], rois.shape())?;
    let regions = resolve_regions(rois, spatial_scale, batch_size)?;
    Ok(regions
        .into_iter()
        .enumerate()
        .map(|(i, region)| {
            let grid = SampleGrid::new(&region, pooled, height, width);
            let skipped = grid.num_out_of_bounds();
            if skipped > 0 {
                trace!(region = i, skipped, "sample points outside the feature map");
            }
            (region, grid)
        })
        .collect())
}

/// Pool each region of `data` into `out`.
///
/// Every element of `out` is overwritten. Cells whose sample point lies
/// outside the feature map are set to zero.
pub fn roi_align_forward<A: NdFloat>(
    mut out: ArrayViewMut4<'_, A>,
    data: ArrayView4<'_, A>,
    rois: ArrayView2<'_, A>,
    spatial_scale: A,
) -> Result<()> {
    let (_, channels, _, _) = data.dim();
    let (_, _, ph, pw) = out.dim();
    check_shape(
        "pooled output",
        &[rois.nrows(), channels, ph, pw],
        out.shape(),
    )?;
    let pooled = PooledSize::new(ph, pw);
    let plan = plan_regions(rois, spatial_scale, data.dim(), pooled)?;
    debug!(regions = plan.len(), channels, %pooled, "roi align forward");

    // each region owns its slice of the output
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(plan.par_iter())
        .for_each(|(mut out, (region, grid))| {
            let image = data.index_axis(Axis(0), region.batch);
            for (plane, out) in image.outer_iter().zip(out.outer_iter_mut()) {
                grid.pool(plane, out);
            }
        });
    Ok(())
}

/// Accumulate the gradient of the pooled output into `grad_in`.
///
/// `grad_in` has the shape of the feature map and is only ever added to;
/// callers that want a plain gradient must zero it first.
///
/// Work is split by `(batch, channel)` plane of `grad_in`. Each plane is
/// owned by one task, which adds in the contributions of every region that
/// points at its batch image, in region order. Overlapping regions therefore
/// never race, and the result doesn't depend on thread scheduling.
pub fn roi_align_backward_acc<A: NdFloat>(
    mut grad_in: ArrayViewMut4<'_, A>,
    grad_out: ArrayView4<'_, A>,
    rois: ArrayView2<'_, A>,
    spatial_scale: A,
) -> Result<()> {
    let (_, channels, _, _) = grad_in.dim();
    let (_, _, ph, pw) = grad_out.dim();
    check_shape(
        "output gradient",
        &[rois.nrows(), channels, ph, pw],
        grad_out.shape(),
    )?;
    let pooled = PooledSize::new(ph, pw);
    let plan = plan_regions(rois, spatial_scale, grad_in.dim(), pooled)?;
    debug!(regions = plan.len(), channels, %pooled, "roi align backward");

    grad_in
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(b, mut image)| {
            image
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(c, mut plane)| {
                    for (r, (_, grid)) in plan
                        .iter()
                        .enumerate()
                        .filter(|(_, (region, _))| region.batch == b)
                    {
                        grid.scatter(grad_out.slice(s![r, c, .., ..]), plane.view_mut());
                    }
                });
        });
    Ok(())
}
