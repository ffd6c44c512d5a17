use crate::{ReferenceGrid, Rectification, RectifyError};
use log::debug;
use serde::{Deserialize, Serialize};
use touchbot_core::{homography_from_4pt, Homography, Quad, RasterSize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for grid-driven rectification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Longer side of the rectified pattern rectangle, in output pixels.
    pub max_dimension: f64,
    /// Bound on either side of the full-frame output raster.
    pub max_full_frame_dimension: f64,
    /// Extend the output so the whole camera frame stays visible.
    pub transform_full_image: bool,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            max_dimension: 800.0,
            max_full_frame_dimension: 4096.0,
            transform_full_image: true,
        }
    }
}

/// Computes a top-down rectification from a detected reference grid.
#[derive(Clone, Debug, Default)]
pub struct HomographyEstimator {
    params: RectifyParams,
}

impl HomographyEstimator {
    pub fn new(params: RectifyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RectifyParams {
        &self.params
    }

    /// Estimate from the outcome of an upstream pattern detection.
    ///
    /// `None` means the detector found no grid; nothing is estimated.
    pub fn estimate_detection(
        &self,
        detection: Option<&ReferenceGrid>,
        frame: RasterSize,
    ) -> Result<Rectification, RectifyError> {
        let grid = detection.ok_or(RectifyError::NoPatternDetected)?;
        self.estimate(grid, frame)
    }

    /// Estimate the camera-to-rectified transform for `grid` seen in a frame of size `frame`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, grid),
            fields(cols = grid.cols(), rows = grid.rows(), full = self.params.transform_full_image)
        )
    )]
    pub fn estimate(
        &self,
        grid: &ReferenceGrid,
        frame: RasterSize,
    ) -> Result<Rectification, RectifyError> {
        let src = grid.outer_corners();

        let width = src.max_width();
        let height = src.max_height();
        let base_max = width.max(height);
        let scale = if base_max > 0.0 {
            self.params.max_dimension / base_max
        } else {
            1.0
        };
        let out_w = round_px(width * scale);
        let out_h = round_px(height * scale);

        let dst = Quad::axis_aligned(out_w as f64, out_h as f64);
        let board = homography_from_4pt(&src.to_array(), &dst.to_array())
            .ok_or(RectifyError::HomographyFailed)?;

        if !self.params.transform_full_image {
            debug!("rectified pattern rectangle {out_w}x{out_h}");
            return Ok(Rectification::new(board, RasterSize::new(out_w, out_h)));
        }

        extend_to_frame(board, frame, self.params.max_full_frame_dimension)
    }
}

/// Prepend translation (and, if needed, a uniform downscale) so the whole
/// camera frame lands inside a non-negative raster no larger than `limit`.
fn extend_to_frame(
    board: Homography,
    frame: RasterSize,
    limit: f64,
) -> Result<Rectification, RectifyError> {
    let projected = frame.corners().map(|p| board.apply(p));
    if projected.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(RectifyError::UnboundedProjection);
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &projected {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let translate = Homography::translation(-min_x, -min_y);

    let mut raw_w = max_x - min_x;
    let mut raw_h = max_y - min_y;
    if raw_w <= 0.0 || raw_h <= 0.0 {
        raw_w = frame.width as f64;
        raw_h = frame.height as f64;
    }

    let mut scale = Homography::identity();
    if raw_w > limit || raw_h > limit {
        let factor = (limit / raw_w).min(limit / raw_h);
        scale = Homography::scaling(factor);
        raw_w *= factor;
        raw_h *= factor;
        debug!("full-frame output downscaled by {factor:.4}");
    }

    let h = scale.then_after(&translate.then_after(&board));
    let size = RasterSize::new(ceil_px(raw_w), ceil_px(raw_h));
    debug!("full-frame rectified raster {}x{}", size.width, size.height);
    Ok(Rectification::new(h, size))
}

fn round_px(v: f64) -> u32 {
    v.round().max(1.0) as u32
}

fn ceil_px(v: f64) -> u32 {
    // tolerate rounding noise from the downscale so 4096.0000001 stays 4096
    (v - 1e-9).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    /// 3x3 grid seen head-on: 200 px wide, 100 px tall, offset by (50, 40).
    fn axis_aligned_grid() -> ReferenceGrid {
        let mut pts = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                pts.push(Point2::new(50.0 + c as f64 * 100.0, 40.0 + r as f64 * 50.0));
            }
        }
        ReferenceGrid::row_major(3, 3, pts).unwrap()
    }

    fn cropped() -> HomographyEstimator {
        HomographyEstimator::new(RectifyParams {
            transform_full_image: false,
            ..RectifyParams::default()
        })
    }

    #[test]
    fn pattern_rectangle_keeps_aspect_at_max_dimension() {
        let r = cropped()
            .estimate(&axis_aligned_grid(), RasterSize::new(640, 480))
            .unwrap();
        assert_eq!(r.size(), RasterSize::new(800, 400));

        let tl = r.apply(Point2::new(50.0, 40.0));
        let br = r.apply(Point2::new(250.0, 140.0));
        assert_relative_eq!(tl.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(tl.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(br.x, 800.0, epsilon = 1e-6);
        assert_relative_eq!(br.y, 400.0, epsilon = 1e-6);
    }

    #[test]
    fn full_frame_output_contains_whole_frame() {
        let est = HomographyEstimator::default();
        let frame = RasterSize::new(640, 480);
        let r = est.estimate(&axis_aligned_grid(), frame).unwrap();

        // scale is 4 px per camera px, so the frame becomes 2560x1920
        assert_eq!(r.size(), RasterSize::new(2560, 1920));
        for corner in frame.corners() {
            let p = r.apply(corner);
            assert!(p.x >= -1e-6 && p.y >= -1e-6);
            assert!(p.x <= 2560.0 + 1e-6 && p.y <= 1920.0 + 1e-6);
        }
        let origin = r.apply(Point2::new(0.0, 0.0));
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn full_frame_output_is_clamped() {
        let est = HomographyEstimator::default();
        let frame = RasterSize::new(1920, 1080);
        let r = est.estimate(&axis_aligned_grid(), frame).unwrap();

        // unclamped would be 7680x4320; the wider side is bounded to 4096
        assert_eq!(r.size().width, 4096);
        assert_eq!(r.size().height, 2304);
        let far = r.apply(Point2::new(1920.0, 1080.0));
        assert_relative_eq!(far.x, 4096.0, epsilon = 1e-6);
        assert_relative_eq!(far.y, 2304.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_pattern_is_terminal() {
        let err = HomographyEstimator::default()
            .estimate_detection(None, RasterSize::new(640, 480))
            .unwrap_err();
        assert_eq!(err, RectifyError::NoPatternDetected);
    }

    #[test]
    fn collapsed_grid_fails() {
        let grid = ReferenceGrid::row_major(2, 2, vec![Point2::new(5.0, 5.0); 4]).unwrap();
        let err = cropped()
            .estimate(&grid, RasterSize::new(640, 480))
            .unwrap_err();
        assert_eq!(err, RectifyError::HomographyFailed);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: RectifyParams = serde_json::from_str(r#"{"transform_full_image":false}"#).unwrap();
        assert_eq!(p.max_dimension, 800.0);
        assert!(!p.transform_full_image);
    }
}
