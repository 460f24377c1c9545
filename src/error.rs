//! Error type shared by the kernel, the operator and the raw-buffer entry points.

use thiserror::Error;

/// Everything that can go wrong before the kernel touches a buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoiAlignError {
    /// Region `region` names a batch image that doesn't exist.
    #[error("region {region}: batch index {batch_index} out of range for batch size {batch_size}")]
    InvalidRegion {
        region: usize,
        batch_index: f64,
        batch_size: usize,
    },

    #[error("shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type Result<T> = std::result::Result<T, RoiAlignError>;

pub(crate) fn check_shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RoiAlignError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
