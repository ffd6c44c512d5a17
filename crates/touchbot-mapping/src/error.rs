use std::fmt;

/// Which side of a calibration pair a degenerate delta was found on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointSpace {
    Image,
    Robot,
}

impl fmt::Display for PointSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointSpace::Image => f.write_str("image"),
            PointSpace::Robot => f.write_str("robot"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error(
        "calibration points must differ in both X and Y ({space} deltas: dx={dx:.6}, dy={dy:.6})"
    )]
    DegenerateAxes { space: PointSpace, dx: f64, dy: f64 },
    #[error("coordinate mapping is not calibrated")]
    NotCalibrated,
    #[error("need at least two calibration pairs, got {got}")]
    NotEnoughPairs { got: usize },
    #[error("raster height must be positive and finite, got {0}")]
    InvalidRasterHeight(f64),
    #[error("calibration record has a zero or non-finite scale (scale_x={scale_x}, scale_y={scale_y})")]
    InvalidScale { scale_x: f64, scale_y: f64 },
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
