//! Views over flat, row-major buffers handed over by a host.

use ndarray::prelude::*;

use crate::error::{Result, RoiAlignError};

fn check_len<D: Dimension>(what: &'static str, shape: &D, len: usize) -> Result<()> {
    let expected = shape.size_checked().ok_or_else(|| {
        RoiAlignError::InvalidParam(format!("{what}: shape {:?} overflows", shape.slice()))
    })?;
    if expected == len {
        Ok(())
    } else {
        Err(RoiAlignError::ShapeMismatch {
            what,
            expected: vec![expected],
            actual: vec![len],
        })
    }
}

/// View `buf` as a C-order array of the given shape.
///
/// The buffer must hold exactly as many elements as the shape.
pub fn view<'a, A, D: Dimension>(
    what: &'static str,
    buf: &'a [A],
    shape: D,
) -> Result<ArrayView<'a, A, D>> {
    check_len(what, &shape, buf.len())?;
    Ok(ArrayView::from_shape(shape, buf).expect("length checked against shape"))
}

pub fn view_mut<'a, A, D: Dimension>(
    what: &'static str,
    buf: &'a mut [A],
    shape: D,
) -> Result<ArrayViewMut<'a, A, D>> {
    check_len(what, &shape, buf.len())?;
    Ok(ArrayViewMut::from_shape(shape, buf).expect("length checked against shape"))
}
