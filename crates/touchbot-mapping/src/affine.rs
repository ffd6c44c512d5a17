use crate::{MappingError, PointSpace};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const MIN_DELTA: f64 = 1e-6;

/// One correspondence between a rectified-image pixel and a robot position in mm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPair {
    pub image: Point2<f64>,
    pub robot: Point2<f64>,
}

impl CalibrationPair {
    pub fn new(image: Point2<f64>, robot: Point2<f64>) -> Self {
        Self { image, robot }
    }
}

/// Flip a raster point (Y down) into the Cartesian mapping frame (Y up).
#[inline]
pub fn raster_to_cartesian(p: Point2<f64>, raster_height: f64) -> Point2<f64> {
    Point2::new(p.x, raster_height - p.y)
}

/// Axis-aligned anisotropic map `robot = diag(scale) * cartesian + translate`.
///
/// No rotation term: robot axes are assumed parallel to the rectified image axes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineMap {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl AffineMap {
    /// Solve the per-axis scale and the translation from two correspondences
    /// already expressed in the Cartesian frame.
    pub fn from_two_points(
        a_cart: Point2<f64>,
        a_robot: Point2<f64>,
        b_cart: Point2<f64>,
        b_robot: Point2<f64>,
    ) -> Result<Self, MappingError> {
        let img_dx = b_cart.x - a_cart.x;
        let img_dy = b_cart.y - a_cart.y;
        if !(img_dx.abs() >= MIN_DELTA && img_dy.abs() >= MIN_DELTA) {
            return Err(MappingError::DegenerateAxes {
                space: PointSpace::Image,
                dx: img_dx,
                dy: img_dy,
            });
        }

        let real_dx = b_robot.x - a_robot.x;
        let real_dy = b_robot.y - a_robot.y;
        if !(real_dx.abs() >= MIN_DELTA && real_dy.abs() >= MIN_DELTA) {
            return Err(MappingError::DegenerateAxes {
                space: PointSpace::Robot,
                dx: real_dx,
                dy: real_dy,
            });
        }

        let scale_x = real_dx / img_dx;
        let scale_y = real_dy / img_dy;
        Ok(Self {
            scale_x,
            scale_y,
            translate_x: a_robot.x - scale_x * a_cart.x,
            translate_y: a_robot.y - scale_y * a_cart.y,
        })
    }

    #[inline]
    pub fn apply(&self, cart: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.scale_x * cart.x + self.translate_x,
            self.scale_y * cart.y + self.translate_y,
        )
    }

    /// Both scales non-zero and every coefficient finite.
    pub fn is_valid(&self) -> bool {
        let all_finite = [self.scale_x, self.scale_y, self.translate_x, self.translate_y]
            .iter()
            .all(|v| v.is_finite());
        all_finite && self.scale_x != 0.0 && self.scale_y != 0.0
    }
}
