use crate::Rectification;
use log::warn;
use touchbot_core::{homography_from_4pt, Homography, Quad, RasterSize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Rectification from four manually placed corners.
///
/// The output raster corresponds exactly to the quad: its width is the
/// longer of the top and bottom edges and its height the longer of the
/// left and right edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualQuadEstimator;

impl ManualQuadEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Never fails. A quad with coincident or colinear corners yields the
    /// zero transform; check [`Rectification::is_degenerate`] before use.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn estimate(&self, quad: &Quad) -> Rectification {
        let out_w = quad.max_width().round().max(1.0) as u32;
        let out_h = quad.max_height().round().max(1.0) as u32;
        let dst = Quad::axis_aligned(out_w as f64, out_h as f64);

        let h = homography_from_4pt(&quad.to_array(), &dst.to_array()).unwrap_or_else(|| {
            warn!("manual quad is degenerate; rectification collapses");
            Homography::zero()
        });
        Rectification::new(h, RasterSize::new(out_w, out_h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn close(a: Point2<f64>, b: Point2<f64>) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn corners_land_on_output_rectangle() {
        let quad = Quad::new(
            Point2::new(102.0, 81.0),
            Point2::new(497.0, 95.0),
            Point2::new(88.0, 402.0),
            Point2::new(515.0, 388.0),
        );
        let r = ManualQuadEstimator::new().estimate(&quad);
        assert!(!r.is_degenerate());

        let size = r.size();
        assert_eq!(size.width, quad.max_width().round() as u32);
        assert_eq!(size.height, quad.max_height().round() as u32);

        let dst = Quad::axis_aligned(size.width as f64, size.height as f64);
        for (src, want) in quad.to_array().iter().zip(dst.to_array()) {
            assert!(close(r.apply(*src), want), "{src:?} -> {:?}", r.apply(*src));
        }
    }

    #[test]
    fn colinear_quad_is_degenerate_not_an_error() {
        let quad = Quad::new(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(30.0, 0.0),
        );
        let r = ManualQuadEstimator::new().estimate(&quad);
        assert!(r.is_degenerate());
        assert_eq!(r.size(), RasterSize::new(10, 20));
    }
}
