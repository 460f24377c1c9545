//! Region-of-interest pooling with bilinear sampling ("ROI Align").

mod array_util;

mod error;
pub use error::{Result, RoiAlignError};

mod geometry;
pub use geometry::{Region, Sample, SampleGrid, REGION_LEN};

mod kernel;
pub use kernel::{roi_align_backward_acc, roi_align_forward};

mod op;
pub use op::{GradReq, RoiAlign};

mod params;
pub use params::{PooledSize, RoiAlignParams};

pub mod raw;

mod traits;
pub use traits::Layer;

pub mod layers;
