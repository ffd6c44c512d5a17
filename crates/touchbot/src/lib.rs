//! Camera-to-robot touch station.
//!
//! This crate ties the workspace together:
//! - re-exports of the geometry, rectification, mapping and motion crates
//! - [`StationConfig`], the JSON configuration of one station
//! - [`Station`], which owns the calibrated mapping and the robot session
//!   and turns rectified-image pixels into physical taps
//! - (feature `image`) helpers converting `image` buffers for rendering the
//!   rectified view
//!
//! ## Quickstart
//!
//! ```no_run
//! use touchbot::{Station, StationConfig};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StationConfig::load_json("station.json")?;
//! let mut station = Station::new(config);
//! station.load_calibration("calibration.json")?;
//! station.connect()?;
//! station.session().home()?;
//! station.touch(Point2::new(240.0, 410.0))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `touchbot::core`: homographies, quads, raster sizes, grayscale warping, logger.
//! - `touchbot::rectify`: grid- and quad-based rectification.
//! - `touchbot::mapping`: pixel to millimetre calibration and its persistence.
//! - `touchbot::motion`: G-code protocol, serial transport, robot session.

pub use touchbot_core as core;
pub use touchbot_mapping as mapping;
pub use touchbot_motion as motion;
pub use touchbot_rectify as rectify;

pub use touchbot_mapping::{CalibrationRecord, CoordinateMapper};
pub use touchbot_motion::{RobotPose, RobotSession};
pub use touchbot_rectify::{HomographyEstimator, ManualQuadEstimator, Rectification};

mod config;
mod station;

pub use config::{ConfigError, SerialSettings, StationConfig, TouchSettings};
pub use station::{Station, StationError};

#[cfg(feature = "image")]
pub mod imageio;
