use crate::RectifyError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use touchbot_core::{warp_perspective_gray, GrayImage, GrayImageView, Homography, RasterSize};

/// A camera-to-rectified projective transform together with the output
/// raster size it was computed for.
///
/// Produced by the estimators and never mutated afterwards; recalibration
/// replaces the whole value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectification {
    h_rect_from_img: Homography,
    size: RasterSize,
}

impl Rectification {
    pub fn new(h_rect_from_img: Homography, size: RasterSize) -> Self {
        Self {
            h_rect_from_img,
            size,
        }
    }

    /// Camera pixels -> rectified pixels.
    pub fn homography(&self) -> Homography {
        self.h_rect_from_img
    }

    pub fn size(&self) -> RasterSize {
        self.size
    }

    /// A singular transform cannot be inverted and collapses the view.
    pub fn is_degenerate(&self) -> bool {
        !self.h_rect_from_img.is_invertible()
    }

    /// Map a camera pixel into the rectified raster.
    pub fn apply(&self, camera_px: Point2<f64>) -> Point2<f64> {
        self.h_rect_from_img.apply(camera_px)
    }

    /// Map a rectified pixel back into the camera frame.
    pub fn to_camera(&self, rect_px: Point2<f64>) -> Result<Point2<f64>, RectifyError> {
        let inv = self
            .h_rect_from_img
            .inverse()
            .ok_or(RectifyError::NonInvertible)?;
        Ok(inv.apply(rect_px))
    }

    /// Render the rectified view of a grayscale camera frame.
    pub fn warp_gray(&self, frame: &GrayImageView<'_>) -> Result<GrayImage, RectifyError> {
        let h_img_from_rect = self
            .h_rect_from_img
            .inverse()
            .ok_or(RectifyError::NonInvertible)?;
        Ok(warp_perspective_gray(
            frame,
            h_img_from_rect,
            self.size.width as usize,
            self.size.height as usize,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn to_camera_inverts_apply() {
        let h = Homography::from_array([[1.1, 0.05, -20.0], [0.02, 0.95, 8.0], [1e-4, 2e-4, 1.0]]);
        let r = Rectification::new(h, RasterSize::new(800, 600));
        let p = Point2::new(312.0, 207.5);
        let back = r.to_camera(r.apply(p)).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_transform_refuses_to_warp() {
        let r = Rectification::new(Homography::zero(), RasterSize::new(4, 4));
        assert!(r.is_degenerate());
        let data = [0u8; 16];
        let view = GrayImageView {
            width: 4,
            height: 4,
            data: &data,
        };
        assert_eq!(r.warp_gray(&view), Err(RectifyError::NonInvertible));
    }

    #[test]
    fn warp_output_has_recorded_size() {
        let r = Rectification::new(Homography::scaling(0.5), RasterSize::new(3, 2));
        let data = [200u8; 36];
        let view = GrayImageView {
            width: 6,
            height: 6,
            data: &data,
        };
        let out = r.warp_gray(&view).unwrap();
        assert_eq!((out.width, out.height), (3, 2));
        assert_eq!(out.data.len(), 6);
    }
}
