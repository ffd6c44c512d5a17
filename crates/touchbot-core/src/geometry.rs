use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

impl RasterSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Frame corners in the order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let w = self.width as f64;
        let h = self.height as f64;
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

/// Four corners of a planar quadrilateral in pixel coordinates.
///
/// Expected to be convex with no three corners colinear; this is not checked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
    pub bottom_right: Point2<f64>,
}

impl Quad {
    pub fn new(
        top_left: Point2<f64>,
        top_right: Point2<f64>,
        bottom_left: Point2<f64>,
        bottom_right: Point2<f64>,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Corners as `[tl, tr, bl, br]`.
    pub fn to_array(&self) -> [Point2<f64>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Longer of the top and bottom edges.
    pub fn max_width(&self) -> f64 {
        let top = nalgebra::distance(&self.top_left, &self.top_right);
        let bottom = nalgebra::distance(&self.bottom_left, &self.bottom_right);
        top.max(bottom)
    }

    /// Longer of the left and right edges.
    pub fn max_height(&self) -> f64 {
        let left = nalgebra::distance(&self.top_left, &self.bottom_left);
        let right = nalgebra::distance(&self.top_right, &self.bottom_right);
        left.max(right)
    }

    /// Axis-aligned rectangle `[0, w] x [0, h]` in the same corner order.
    pub fn axis_aligned(width: f64, height: f64) -> Self {
        Self::new(
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(0.0, height),
            Point2::new(width, height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn edge_lengths_take_the_longer_side() {
        let q = Quad::new(
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(10.0, 60.0),
            Point2::new(90.0, 50.0),
        );
        assert_relative_eq!(q.max_width(), 100.0);
        assert_relative_eq!(q.max_height(), (10.0_f64 * 10.0 + 60.0 * 60.0).sqrt());
    }

    #[test]
    fn frame_corners_go_clockwise_from_origin() {
        let c = RasterSize::new(640, 480).corners();
        assert_eq!(c[1], Point2::new(640.0, 0.0));
        assert_eq!(c[2], Point2::new(640.0, 480.0));
    }
}
