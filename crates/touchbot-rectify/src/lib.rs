//! Perspective rectification of an oblique camera view.
//!
//! Two entry points produce the same [`Rectification`] value:
//!
//! - [`HomographyEstimator`] takes a detected reference grid (for example the
//!   inner corners of a chessboard shown on the phone screen), maps its four
//!   outer corners to an axis-aligned rectangle whose longer side is
//!   `max_dimension` pixels, and optionally extends the output so the entire
//!   camera frame remains visible.
//! - [`ManualQuadEstimator`] takes four corners clicked by an operator and
//!   maps them to a rectangle sized from the quad's edge lengths.
//!
//! Pattern detection and frame capture are not part of this crate.

mod error;
mod estimator;
mod grid;
mod manual;
mod rectification;

pub use error::RectifyError;
pub use estimator::{HomographyEstimator, RectifyParams};
pub use grid::{GridOrder, ReferenceGrid};
pub use manual::ManualQuadEstimator;
pub use rectification::Rectification;
