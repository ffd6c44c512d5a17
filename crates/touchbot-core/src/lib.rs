//! Core geometry for touchbot.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about cameras, pattern detectors or robots; the rectification, mapping
//! and motion crates build on the types defined here.

mod geometry;
mod homography;
mod image;
mod logger;

pub use geometry::{Quad, RasterSize};
pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};

pub use nalgebra::Point2;
