//! Rectified-image pixels to robot millimetres.
//!
//! The mapping is fitted from two reference points whose robot position was
//! measured by jogging the stylus onto them. Image points are first flipped
//! into a Cartesian frame (`y' = raster_height - y`), then each axis gets its
//! own scale and offset:
//!
//! ```
//! use touchbot_mapping::{CalibrationPair, CoordinateMapper};
//! use nalgebra::Point2;
//!
//! let mut mapper = CoordinateMapper::new();
//! mapper.fit(
//!     CalibrationPair::new(Point2::new(0.0, 200.0), Point2::new(10.0, 10.0)),
//!     CalibrationPair::new(Point2::new(100.0, 0.0), Point2::new(60.0, 110.0)),
//!     200.0,
//! )?;
//! let robot = mapper.apply(Point2::new(50.0, 0.0))?;
//! assert!((robot.x - 35.0).abs() < 1e-9);
//! # Ok::<(), touchbot_mapping::MappingError>(())
//! ```

mod affine;
mod error;
mod io;
mod mapper;

pub use affine::{raster_to_cartesian, AffineMap, CalibrationPair};
pub use error::{CalibrationIoError, MappingError, PointSpace};
pub use io::CalibrationRecord;
pub use mapper::{Calibration, CoordinateMapper};
