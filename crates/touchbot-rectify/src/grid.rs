use crate::RectifyError;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use touchbot_core::Quad;

/// Order in which a pattern detector reports grid points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridOrder {
    /// All points of the first row (left to right), then the second row, ...
    #[default]
    RowMajor,
    /// All points of the first column (top to bottom), then the second column, ...
    ColumnMajor,
}

#[derive(Deserialize)]
struct RawGrid {
    cols: usize,
    rows: usize,
    #[serde(default)]
    order: GridOrder,
    points: Vec<Point2<f64>>,
}

/// Inner-corner grid of a reference pattern (e.g. a chessboard) in camera pixels.
///
/// The point ordering is part of the value: corner selection reads it from
/// `order` instead of assuming how the detector enumerated the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct ReferenceGrid {
    cols: usize,
    rows: usize,
    order: GridOrder,
    points: Vec<Point2<f64>>,
}

impl TryFrom<RawGrid> for ReferenceGrid {
    type Error = RectifyError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Self::new(raw.cols, raw.rows, raw.order, raw.points)
    }
}

impl ReferenceGrid {
    pub fn new(
        cols: usize,
        rows: usize,
        order: GridOrder,
        points: Vec<Point2<f64>>,
    ) -> Result<Self, RectifyError> {
        if cols < 2 || rows < 2 {
            return Err(RectifyError::GridTooSmall { cols, rows });
        }
        let expected = cols * rows;
        if points.len() != expected {
            return Err(RectifyError::GridShape {
                cols,
                rows,
                expected,
                got: points.len(),
            });
        }
        Ok(Self {
            cols,
            rows,
            order,
            points,
        })
    }

    pub fn row_major(
        cols: usize,
        rows: usize,
        points: Vec<Point2<f64>>,
    ) -> Result<Self, RectifyError> {
        Self::new(cols, rows, GridOrder::RowMajor, points)
    }

    /// Wrap the output of an external detector. `None` means the pattern was not found.
    pub fn from_detection(
        cols: usize,
        rows: usize,
        order: GridOrder,
        detection: Option<Vec<Point2<f64>>>,
    ) -> Result<Self, RectifyError> {
        let points = detection.ok_or(RectifyError::NoPatternDetected)?;
        Self::new(cols, rows, order, points)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn order(&self) -> GridOrder {
        self.order
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Point at grid column `col` and row `row`.
    pub fn at(&self, col: usize, row: usize) -> Option<Point2<f64>> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.points.get(self.index(col, row)).copied()
    }

    fn index(&self, col: usize, row: usize) -> usize {
        match self.order {
            GridOrder::RowMajor => row * self.cols + col,
            GridOrder::ColumnMajor => col * self.rows + row,
        }
    }

    /// The four extreme grid corners.
    pub fn outer_corners(&self) -> Quad {
        // cols, rows >= 2 and points.len() == cols * rows by construction
        let (c, r) = (self.cols - 1, self.rows - 1);
        let p = |col, row| self.points[self.index(col, row)];
        Quad::new(p(0, 0), p(c, 0), p(0, r), p(c, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(cols: usize, rows: usize, order: GridOrder) -> Vec<Point2<f64>> {
        let mut out = Vec::with_capacity(cols * rows);
        match order {
            GridOrder::RowMajor => {
                for r in 0..rows {
                    for c in 0..cols {
                        out.push(Point2::new(c as f64 * 10.0, r as f64 * 20.0));
                    }
                }
            }
            GridOrder::ColumnMajor => {
                for c in 0..cols {
                    for r in 0..rows {
                        out.push(Point2::new(c as f64 * 10.0, r as f64 * 20.0));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn row_major_corners_are_first_last_of_rows() {
        let grid = ReferenceGrid::row_major(4, 3, lattice(4, 3, GridOrder::RowMajor)).unwrap();
        let q = grid.outer_corners();
        assert_eq!(q.top_left, grid.points()[0]);
        assert_eq!(q.top_right, grid.points()[3]);
        assert_eq!(q.bottom_left, grid.points()[8]);
        assert_eq!(q.bottom_right, grid.points()[11]);
    }

    #[test]
    fn column_major_yields_same_corners() {
        let a = ReferenceGrid::row_major(4, 3, lattice(4, 3, GridOrder::RowMajor)).unwrap();
        let b = ReferenceGrid::new(4, 3, GridOrder::ColumnMajor, lattice(4, 3, GridOrder::ColumnMajor))
            .unwrap();
        assert_eq!(a.outer_corners(), b.outer_corners());
        assert_eq!(b.outer_corners().bottom_left, Point2::new(0.0, 40.0));
    }

    #[test]
    fn rejects_wrong_point_count() {
        let err = ReferenceGrid::row_major(3, 3, vec![Point2::origin(); 8]).unwrap_err();
        assert_eq!(
            err,
            RectifyError::GridShape {
                cols: 3,
                rows: 3,
                expected: 9,
                got: 8
            }
        );
    }

    #[test]
    fn rejects_degenerate_grid_dimensions() {
        let err = ReferenceGrid::row_major(1, 5, vec![Point2::origin(); 5]).unwrap_err();
        assert_eq!(err, RectifyError::GridTooSmall { cols: 1, rows: 5 });
    }

    #[test]
    fn missing_detection_is_reported() {
        let err = ReferenceGrid::from_detection(7, 7, GridOrder::RowMajor, None).unwrap_err();
        assert_eq!(err, RectifyError::NoPatternDetected);
    }

    #[test]
    fn deserialization_validates_shape() {
        let ok = r#"{"cols":2,"rows":2,"points":[[0,0],[1,0],[0,1],[1,1]]}"#;
        let grid: ReferenceGrid = serde_json::from_str(ok).unwrap();
        assert_eq!(grid.order(), GridOrder::RowMajor);

        let bad = r#"{"cols":2,"rows":2,"points":[[0,0],[1,0],[0,1]]}"#;
        assert!(serde_json::from_str::<ReferenceGrid>(bad).is_err());
    }
}
