//! JSON persistence for calibration records.

use crate::{
    AffineMap, Calibration, CalibrationIoError, CalibrationPair, CoordinateMapper, MappingError,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use touchbot_core::{Homography, RasterSize};

/// Everything the operator needs to resume touching without recalibrating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    /// Raster height the image points were flipped with during the fit.
    pub raster_height: f64,
    pub calibration_pairs: Vec<CalibrationPair>,
    /// Camera -> rectified transform in effect when the pairs were picked.
    #[serde(default)]
    pub homography: Option<Homography>,
    #[serde(default)]
    pub rectified_size: Option<RasterSize>,
    /// Robot Z (mm) of the phone surface.
    #[serde(default)]
    pub phone_z: f64,
}

impl CalibrationRecord {
    pub fn new(calibration: &Calibration, phone_z: f64) -> Self {
        let map = calibration.map();
        Self {
            scale_x: map.scale_x,
            scale_y: map.scale_y,
            translate_x: map.translate_x,
            translate_y: map.translate_y,
            raster_height: calibration.raster_height(),
            calibration_pairs: calibration.pairs().to_vec(),
            homography: None,
            rectified_size: None,
            phone_z,
        }
    }

    /// Attach the rectification the calibration pairs were picked in.
    pub fn with_rectification(mut self, homography: Homography, size: RasterSize) -> Self {
        self.homography = Some(homography);
        self.rectified_size = Some(size);
        self
    }

    pub fn affine_map(&self) -> AffineMap {
        AffineMap {
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            translate_x: self.translate_x,
            translate_y: self.translate_y,
        }
    }

    /// Rebuild the calibration without re-running the fit.
    pub fn to_calibration(&self) -> Result<Calibration, MappingError> {
        Calibration::from_parts(
            self.affine_map(),
            self.raster_height,
            self.calibration_pairs.clone(),
        )
    }

    /// Load a record from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this record to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl CoordinateMapper {
    /// Restore a mapper from a persisted record.
    pub fn from_record(record: &CalibrationRecord) -> Result<Self, MappingError> {
        Ok(Self::with_calibration(record.to_calibration()?))
    }
}
