//! Serial motion control for a delta robot speaking line-oriented G-code.
//!
//! [`MotionProtocol`] frames single request/response exchanges over a
//! [`LineTransport`]; [`RobotSession`] builds tracked moves, homing and the
//! safe touch sequence on top of it.
//!
//! ```no_run
//! use std::time::Duration;
//! use touchbot_motion::{feedrate_from_speed, ProtocolConfig, RobotConfig, RobotSession, TouchRequest};
//!
//! let session = RobotSession::new(ProtocolConfig::default(), RobotConfig::default());
//! session.connect_serial("/dev/ttyUSB0", 115_200)?;
//! session.home()?;
//! session.touch_sequence(&TouchRequest {
//!     x: 12.0,
//!     y: -8.5,
//!     phone_z: -340.0,
//!     touch_force: 1.0,
//!     touch_duration: Duration::from_millis(100),
//!     safe_z: -330.0,
//!     feedrate: feedrate_from_speed(100.0),
//! })?;
//! # Ok::<(), touchbot_motion::MotionError>(())
//! ```

mod command;
mod error;
pub mod mock;
mod position;
mod protocol;
mod session;
mod transport;

pub use command::{feedrate_from_speed, Axis, Command};
pub use error::{MotionError, ProtocolError};
pub use position::{parse_position_report, RobotPose};
pub use protocol::{Completion, Handshake, MotionProtocol, ProtocolConfig, Response};
pub use session::{Procedure, RobotConfig, RobotSession, SequenceStep, TouchRequest};
pub use transport::{list_ports, LineTransport, SerialTransport};
