//! Where each pooled cell samples the feature map.
//!
//! A region is scaled into feature-map pixel space, split into a
//! `(pooled_height - 1) x (pooled_width - 1)` lattice of bins, and cell
//! `(ph, pw)` samples the lattice point `(y1 + ph * bin_h, x1 + pw * bin_w)`.
//! The value there is a bilinear blend of the four grid cells around it.
//!
//! Nothing in this module depends on the channel, so a [`SampleGrid`] is
//! computed once per region and reused for every channel plane, forward and
//! backward.

use ndarray::prelude::*;
use ndarray::{NdFloat, Zip};
use num_traits::NumCast;

use crate::error::{Result, RoiAlignError};
use crate::params::PooledSize;

/// Number of values describing one region: `[batch_index, x1, y1, x2, y2]`.
pub const REGION_LEN: usize = 5;

pub(crate) fn cast<A: NdFloat>(n: usize) -> A {
    <A as NumCast>::from(n).expect("every usize is representable as a float")
}

/// One row of the region list, resolved against a feature map.
///
/// Coordinates are already multiplied by the spatial scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region<A> {
    pub batch: usize,
    pub x1: A,
    pub y1: A,
    pub x2: A,
    pub y2: A,
}

impl<A: NdFloat> Region<A> {
    /// Read region number `index` from `row` and scale it.
    ///
    /// The batch index is truncated toward zero; it must be finite,
    /// non-negative and less than `batch_size`. Values in `(-1, 0)` are
    /// rejected too, even though an integer cast would turn them into 0.
    pub fn from_row(
        index: usize,
        row: ArrayView1<'_, A>,
        spatial_scale: A,
        batch_size: usize,
    ) -> Result<Self> {
        if row.len() != REGION_LEN {
            return Err(RoiAlignError::ShapeMismatch {
                what: "region row",
                expected: vec![REGION_LEN],
                actual: vec![row.len()],
            });
        }
        let raw = row[0];
        let invalid = || RoiAlignError::InvalidRegion {
            region: index,
            batch_index: raw.to_f64().unwrap_or(f64::NAN),
            batch_size,
        };
        if !raw.is_finite() || raw < A::zero() {
            return Err(invalid());
        }
        let batch = raw.trunc().to_usize().ok_or_else(invalid)?;
        if batch >= batch_size {
            return Err(invalid());
        }
        Ok(Region {
            batch,
            x1: row[1] * spatial_scale,
            y1: row[2] * spatial_scale,
            x2: row[3] * spatial_scale,
            y2: row[4] * spatial_scale,
        })
    }

    /// Width in pixels. Inverted regions have width 0.
    pub fn width(&self) -> A {
        (self.x2 - self.x1).max(A::zero())
    }

    /// Height in pixels. Inverted regions have height 0.
    pub fn height(&self) -> A {
        (self.y2 - self.y1).max(A::zero())
    }
}

/// Resolve every row of `rois` up front, so that a bad batch index is
/// reported before any output is written.
pub(crate) fn resolve_regions<A: NdFloat>(
    rois: ArrayView2<'_, A>,
    spatial_scale: A,
    batch_size: usize,
) -> Result<Vec<Region<A>>> {
    rois.outer_iter()
        .enumerate()
        .map(|(i, row)| Region::from_row(i, row, spatial_scale, batch_size))
        .collect()
}

/// Spacing between sample points along one axis.
///
/// A single pooled cell has no spacing; it samples the region start.
fn bin_size<A: NdFloat>(extent: A, pooled: usize) -> A {
    if pooled > 1 {
        extent / cast(pooled - 1)
    } else {
        A::zero()
    }
}

/// The two grid lines around a coordinate on one axis, and the offset of the
/// coordinate from the first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisSample<A> {
    lo: usize,
    hi: usize,
    frac: A,
}

/// `None` if `coord` is outside `[0, len)`.
///
/// `lo` is clamped to `len - 2` so that `hi = lo + 1` exists; a sample past
/// the last grid line therefore extrapolates from the last two. On an axis of
/// length 1, `hi == lo` and both weights land on the same cell.
fn axis_sample<A: NdFloat>(coord: A, len: usize) -> Option<AxisSample<A>> {
    if !(coord >= A::zero() && coord < cast(len)) {
        return None;
    }
    let lo = coord.floor().to_usize()?.min(len.saturating_sub(2));
    let hi = (lo + 1).min(len - 1);
    Some(AxisSample {
        lo,
        hi,
        frac: coord - cast(lo),
    })
}

/// An in-bounds sample point: four neighbors and the fractional offsets
/// used to weight them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<A> {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
    pub dy: A,
    pub dx: A,
}

impl<A: NdFloat> Sample<A> {
    /// Locate the point `(y, x)` in a `height x width` plane.
    pub fn at(y: A, x: A, height: usize, width: usize) -> Option<Self> {
        let row = axis_sample(y, height)?;
        let col = axis_sample(x, width)?;
        Some(Sample {
            top: row.lo,
            bottom: row.hi,
            left: col.lo,
            right: col.hi,
            dy: row.frac,
            dx: col.frac,
        })
    }

    /// Bilinear weights for top-left, top-right, bottom-left, bottom-right.
    pub fn weights(&self) -> [A; 4] {
        let one = A::one();
        let (dy, dx) = (self.dy, self.dx);
        [
            (one - dy) * (one - dx),
            (one - dy) * dx,
            dy * (one - dx),
            dy * dx,
        ]
    }

    /// `(row, col)` of top-left, top-right, bottom-left, bottom-right.
    pub fn neighbors(&self) -> [(usize, usize); 4] {
        [
            (self.top, self.left),
            (self.top, self.right),
            (self.bottom, self.left),
            (self.bottom, self.right),
        ]
    }

    pub fn interpolate(&self, plane: &ArrayView2<'_, A>) -> A {
        self.neighbors()
            .iter()
            .zip(self.weights())
            .fold(A::zero(), |acc, (&ix, w)| acc + plane[ix] * w)
    }

    /// Add `grad`, split by the bilinear weights, into the four neighbors.
    pub fn scatter(&self, plane: &mut ArrayViewMut2<'_, A>, grad: A) {
        for (&ix, w) in self.neighbors().iter().zip(self.weights()) {
            plane[ix] += grad * w;
        }
    }
}

/// Sample points for every pooled cell of one region.
///
/// `None` marks a cell whose sample point falls outside the feature map.
#[derive(Debug, Clone)]
pub struct SampleGrid<A> {
    samples: Array2<Option<Sample<A>>>,
}

impl<A: NdFloat> SampleGrid<A> {
    pub fn new(region: &Region<A>, pooled: PooledSize, height: usize, width: usize) -> Self {
        let bin_h = bin_size(region.height(), pooled.height);
        let bin_w = bin_size(region.width(), pooled.width);
        let samples = Array2::from_shape_fn((pooled.height, pooled.width), |(ph, pw)| {
            let y = cast::<A>(ph) * bin_h + region.y1;
            let x = cast::<A>(pw) * bin_w + region.x1;
            Sample::at(y, x, height, width)
        });
        SampleGrid { samples }
    }

    pub fn samples(&self) -> ArrayView2<'_, Option<Sample<A>>> {
        self.samples.view()
    }

    pub fn num_out_of_bounds(&self) -> usize {
        self.samples.iter().filter(|s| s.is_none()).count()
    }

    /// Forward pass for one channel: overwrite every cell of `out`.
    ///
    /// `out` must have shape `(pooled_height, pooled_width)`.
    pub fn pool(&self, plane: ArrayView2<'_, A>, out: ArrayViewMut2<'_, A>) {
        Zip::from(out)
            .and(&self.samples)
            .for_each(|y, sample| {
                *y = match sample {
                    Some(s) => s.interpolate(&plane),
                    None => A::zero(),
                }
            });
    }

    /// Backward pass for one channel: accumulate `dz` into `plane`.
    pub fn scatter(&self, dz: ArrayView2<'_, A>, mut plane: ArrayViewMut2<'_, A>) {
        Zip::from(dz)
            .and(&self.samples)
            .for_each(|&g, sample| {
                if let Some(s) = sample {
                    s.scatter(&mut plane, g);
                }
            });
    }
}
