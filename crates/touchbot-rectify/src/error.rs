/// Errors produced while estimating or using a rectifying transform.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("no reference pattern detected in the frame")]
    NoPatternDetected,
    #[error("reference grid must be at least 2x2 (got {cols}x{rows})")]
    GridTooSmall { cols: usize, rows: usize },
    #[error("reference grid {cols}x{rows} expects {expected} points, got {got}")]
    GridShape {
        cols: usize,
        rows: usize,
        expected: usize,
        got: usize,
    },
    #[error("homography estimation failed")]
    HomographyFailed,
    #[error("a frame corner projects to infinity; the view is too oblique to extend")]
    UnboundedProjection,
    #[error("homography not invertible")]
    NonInvertible,
}
