//! Operator parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoiAlignError};

/// Spatial size every region is resized to: `(pooled_height, pooled_width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PooledSize {
    pub height: usize,
    pub width: usize,
}

impl PooledSize {
    pub fn new(height: usize, width: usize) -> Self {
        PooledSize { height, width }
    }

    pub fn square(size: usize) -> Self {
        PooledSize::new(size, size)
    }
}

impl From<(usize, usize)> for PooledSize {
    fn from((height, width): (usize, usize)) -> Self {
        PooledSize::new(height, width)
    }
}

impl fmt::Display for PooledSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.height, self.width)
    }
}

/// Accepts the forms hosts write shape parameters in: `"(7, 7)"`, `"7,7"`,
/// or a bare `"7"` for a square.
impl FromStr for PooledSize {
    type Err = RoiAlignError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || RoiAlignError::InvalidParam(format!("can't parse pooled size {s:?}"));
        let inner = s.trim();
        let inner = inner
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(inner);
        let dims = inner
            .split(',')
            .map(|d| d.trim().parse::<usize>().map_err(|_| bad()))
            .collect::<Result<Vec<usize>>>()?;
        match dims[..] {
            [size] => Ok(PooledSize::square(size)),
            [height, width] => Ok(PooledSize::new(height, width)),
            _ => Err(bad()),
        }
    }
}

/// Validated parameters of a ROI Align operator.
///
/// Deserializing runs the same checks as [`RoiAlignParams::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedParams")]
pub struct RoiAlignParams {
    pooled_size: PooledSize,
    spatial_scale: f32,
}

#[derive(Deserialize)]
struct UncheckedParams {
    pooled_size: PooledSize,
    spatial_scale: f32,
}

impl TryFrom<UncheckedParams> for RoiAlignParams {
    type Error = RoiAlignError;

    fn try_from(p: UncheckedParams) -> Result<Self> {
        RoiAlignParams::new(p.pooled_size, p.spatial_scale)
    }
}

impl RoiAlignParams {
    /// `spatial_scale` converts region coordinates to feature-map pixels,
    /// e.g. `1.0 / 16.0` for a stride-16 backbone.
    pub fn new(pooled_size: impl Into<PooledSize>, spatial_scale: f32) -> Result<Self> {
        let pooled_size = pooled_size.into();
        if pooled_size.height == 0 || pooled_size.width == 0 {
            return Err(RoiAlignError::InvalidParam(format!(
                "pooled size must be positive, got {pooled_size}"
            )));
        }
        if !(spatial_scale.is_finite() && spatial_scale > 0.0) {
            return Err(RoiAlignError::InvalidParam(format!(
                "spatial scale must be finite and positive, got {spatial_scale}"
            )));
        }
        Ok(RoiAlignParams {
            pooled_size,
            spatial_scale,
        })
    }

    pub fn pooled_size(&self) -> PooledSize {
        self.pooled_size
    }

    pub fn spatial_scale(&self) -> f32 {
        self.spatial_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pooled_size() {
        assert_eq!("(7, 7)".parse::<PooledSize>().unwrap(), PooledSize::new(7, 7));
        assert_eq!(" 3,5 ".parse::<PooledSize>().unwrap(), PooledSize::new(3, 5));
        assert_eq!("14".parse::<PooledSize>().unwrap(), PooledSize::square(14));
        for bad in ["", "()", "(1, 2, 3)", "a,b", "(2, 2"] {
            assert!(bad.parse::<PooledSize>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let p = PooledSize::new(2, 3);
        assert_eq!(p.to_string().parse::<PooledSize>().unwrap(), p);
    }

    #[test]
    fn validation() {
        assert!(RoiAlignParams::new((2, 2), 0.0625).is_ok());
        assert!(RoiAlignParams::new((0, 2), 1.0).is_err());
        assert!(RoiAlignParams::new((2, 0), 1.0).is_err());
        assert!(RoiAlignParams::new((2, 2), 0.0).is_err());
        assert!(RoiAlignParams::new((2, 2), -1.0).is_err());
        assert!(RoiAlignParams::new((2, 2), f32::NAN).is_err());
    }

    #[test]
    fn deserialize_validates() {
        let p: RoiAlignParams = serde_json::from_str(
            r#"{"pooled_size": {"height": 7, "width": 7}, "spatial_scale": 0.25}"#,
        )
        .unwrap();
        assert_eq!(p.pooled_size(), PooledSize::square(7));
        assert_eq!(p.spatial_scale(), 0.25);

        let err = serde_json::from_str::<RoiAlignParams>(
            r#"{"pooled_size": {"height": 0, "width": 7}, "spatial_scale": 0.25}"#,
        );
        assert!(err.is_err());
    }
}
