//! Layers built on the ROI Align operator.

mod roi_align;

pub use roi_align::RoiAlignLayer;
