use crate::{raster_to_cartesian, AffineMap, CalibrationPair, MappingError};
use log::info;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A fitted mapping plus everything needed to reproduce it.
///
/// The raster height used for the Y flip is frozen at fit time, so later
/// queries flip exactly the way the calibration points were flipped even if
/// the live rectified frame changes size.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    map: AffineMap,
    raster_height: f64,
    pairs: Vec<CalibrationPair>,
}

impl Calibration {
    pub(crate) fn from_parts(
        map: AffineMap,
        raster_height: f64,
        pairs: Vec<CalibrationPair>,
    ) -> Result<Self, MappingError> {
        validate_height(raster_height)?;
        if !map.is_valid() {
            return Err(MappingError::InvalidScale {
                scale_x: map.scale_x,
                scale_y: map.scale_y,
            });
        }
        if pairs.len() < 2 {
            return Err(MappingError::NotEnoughPairs { got: pairs.len() });
        }
        Ok(Self {
            map,
            raster_height,
            pairs,
        })
    }

    pub fn map(&self) -> AffineMap {
        self.map
    }

    pub fn raster_height(&self) -> f64 {
        self.raster_height
    }

    /// All recorded pairs. Only the first two take part in the fit.
    pub fn pairs(&self) -> &[CalibrationPair] {
        &self.pairs
    }

    pub fn apply(&self, image: Point2<f64>) -> Point2<f64> {
        self.map.apply(raster_to_cartesian(image, self.raster_height))
    }
}

fn validate_height(raster_height: f64) -> Result<(), MappingError> {
    if raster_height.is_finite() && raster_height > 0.0 {
        Ok(())
    } else {
        Err(MappingError::InvalidRasterHeight(raster_height))
    }
}

/// Rectified-image pixels to robot millimetres.
///
/// Starts uncalibrated. A successful fit replaces the previous calibration
/// as a whole; a failed fit leaves it untouched.
#[derive(Clone, Debug, Default)]
pub struct CoordinateMapper {
    calibration: Option<Calibration>,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calibration(calibration: Calibration) -> Self {
        Self {
            calibration: Some(calibration),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn affine_map(&self) -> Option<AffineMap> {
        self.calibration.as_ref().map(Calibration::map)
    }

    /// Fit from exactly two pairs, flipping image Y with `raster_height`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn fit(
        &mut self,
        p1: CalibrationPair,
        p2: CalibrationPair,
        raster_height: f64,
    ) -> Result<AffineMap, MappingError> {
        self.fit_pairs(&[p1, p2], raster_height)
    }

    /// Fit from the first two of `pairs`; every pair is kept for audit.
    pub fn fit_pairs(
        &mut self,
        pairs: &[CalibrationPair],
        raster_height: f64,
    ) -> Result<AffineMap, MappingError> {
        validate_height(raster_height)?;
        let [p1, p2, ..] = pairs else {
            return Err(MappingError::NotEnoughPairs { got: pairs.len() });
        };

        let map = AffineMap::from_two_points(
            raster_to_cartesian(p1.image, raster_height),
            p1.robot,
            raster_to_cartesian(p2.image, raster_height),
            p2.robot,
        )?;
        let calibration = Calibration::from_parts(map, raster_height, pairs.to_vec())?;

        info!(
            "mapping calibrated: scale_x={:.4} mm/px, scale_y={:.4} mm/px",
            map.scale_x, map.scale_y
        );
        self.calibration = Some(calibration);
        Ok(map)
    }

    /// Map a rectified-image pixel to robot millimetres.
    pub fn apply(&self, image: Point2<f64>) -> Result<Point2<f64>, MappingError> {
        self.calibration
            .as_ref()
            .map(|c| c.apply(image))
            .ok_or(MappingError::NotCalibrated)
    }

    pub fn reset(&mut self) {
        self.calibration = None;
    }
}
