use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    parse_position_report, Axis, Command, Completion, LineTransport, MotionError, MotionProtocol,
    ProtocolConfig, Response, RobotPose, SerialTransport,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Z reported after homing, in mm.
    pub home_z: f64,
    /// Feedrate (mm/min) for moves that do not name one.
    pub default_feedrate: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            home_z: -291.28,
            default_feedrate: 2000.0,
        }
    }
}

/// Multi-step procedures that can abort part way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Procedure {
    Touch,
    SafeTravel,
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Procedure::Touch => "touch sequence",
            Procedure::SafeTravel => "safe travel",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceStep {
    RaiseToSafe,
    TravelXY,
    Lower,
    Dwell,
    Lift,
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SequenceStep::RaiseToSafe => "raise to safe height",
            SequenceStep::TravelXY => "travel in XY",
            SequenceStep::Lower => "lower to contact",
            SequenceStep::Dwell => "dwell",
            SequenceStep::Lift => "lift",
        })
    }
}

/// One tap on the phone screen.
#[derive(Clone, Debug, PartialEq)]
pub struct TouchRequest {
    pub x: f64,
    pub y: f64,
    /// Z of the screen surface, in mm.
    pub phone_z: f64,
    /// How far below `phone_z` to press, in mm.
    pub touch_force: f64,
    pub touch_duration: Duration,
    /// Clearance height for travel, in mm.
    pub safe_z: f64,
    /// mm/min
    pub feedrate: f64,
}

impl TouchRequest {
    pub fn contact_z(&self) -> f64 {
        self.phone_z - self.touch_force
    }
}

/// A connected robot with a tracked pose.
///
/// The pose only changes after the device acknowledges a move. Multi-step
/// procedures hold a sequence lock so commands from other threads cannot
/// interleave with them.
pub struct RobotSession {
    protocol: MotionProtocol,
    config: RobotConfig,
    pose: Mutex<RobotPose>,
    sequence: Mutex<()>,
}

/// Puts the controller in relative mode and restores absolute mode on drop.
struct RelativeMode<'a> {
    protocol: &'a MotionProtocol,
}

impl<'a> RelativeMode<'a> {
    fn enter(protocol: &'a MotionProtocol) -> Result<Self, MotionError> {
        protocol.send(&Command::RelativeMode)?;
        Ok(Self { protocol })
    }
}

impl Drop for RelativeMode<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.protocol.send(&Command::AbsoluteMode) {
            warn!("failed to restore absolute mode: {e}");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turn a non-`ok` completion into an error.
fn acknowledged(response: Response) -> Result<Response, MotionError> {
    match response.completion {
        Completion::Ok | Completion::NotAwaited => Ok(response),
        Completion::Error => Err(MotionError::Rejected {
            reply: response.terminator().unwrap_or_default().to_string(),
            command: response.command,
        }),
        Completion::TimedOut => Err(MotionError::Timeout {
            command: response.command,
            lines: response.lines,
        }),
    }
}

impl RobotSession {
    pub fn new(protocol: ProtocolConfig, config: RobotConfig) -> Self {
        Self::with_protocol(MotionProtocol::new(protocol), config)
    }

    pub fn with_protocol(protocol: MotionProtocol, config: RobotConfig) -> Self {
        let home = RobotPose::home(config.home_z);
        Self {
            protocol,
            config,
            pose: Mutex::new(home),
            sequence: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn protocol(&self) -> &MotionProtocol {
        &self.protocol
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.is_connected()
    }

    fn set_pose(&self, pose: RobotPose) {
        *lock(&self.pose) = pose;
    }

    fn feedrate_or_default(&self, feedrate: Option<f64>) -> f64 {
        feedrate.unwrap_or(self.config.default_feedrate)
    }

    /// Connect, assume the home pose and switch to absolute mode.
    ///
    /// The link is closed again if absolute mode cannot be selected.
    pub fn connect(&self, transport: Box<dyn LineTransport>) -> Result<(), MotionError> {
        let _seq = lock(&self.sequence);
        self.protocol.connect(transport)?;
        self.set_pose(RobotPose::home(self.config.home_z));
        if let Err(e) = self.protocol.send(&Command::AbsoluteMode) {
            warn!("closing link, absolute mode not selected: {e}");
            self.protocol.disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    pub fn connect_serial(&self, port: &str, baud_rate: u32) -> Result<(), MotionError> {
        let read_timeout = self.protocol.config().handshake_timeout();
        let transport = SerialTransport::open(port, baud_rate, read_timeout)?;
        info!("connecting to {port} at {baud_rate} baud");
        self.connect(Box::new(transport))
    }

    pub fn disconnect(&self) {
        let _seq = lock(&self.sequence);
        self.protocol.disconnect();
        self.set_pose(RobotPose::home(self.config.home_z));
    }

    /// Last known pose. Never touches the link.
    pub fn pose(&self) -> RobotPose {
        *lock(&self.pose)
    }

    /// Ask the controller where it is and resync the tracked pose.
    ///
    /// Disconnected sessions return the tracked pose. A reply without a
    /// parsable report leaves the tracked pose unchanged.
    pub fn get_position(&self) -> Result<RobotPose, MotionError> {
        if !self.is_connected() {
            return Ok(self.pose());
        }
        let _seq = lock(&self.sequence);
        let response = self.protocol.send(&Command::QueryPosition)?;
        match response.lines.iter().find_map(|l| parse_position_report(l)) {
            Some(reported) => {
                debug!("position report {reported:?}");
                self.set_pose(reported);
                Ok(reported)
            }
            None => {
                acknowledged(response)?;
                warn!("M114 reply carried no position report");
                Ok(self.pose())
            }
        }
    }

    fn move_absolute_unlocked(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        feedrate: f64,
    ) -> Result<Response, MotionError> {
        let command = Command::LinearMove { x, y, z, feedrate };
        let response = acknowledged(self.protocol.send(&command)?)?;
        let mut pose = lock(&self.pose);
        pose.x = x.unwrap_or(pose.x);
        pose.y = y.unwrap_or(pose.y);
        pose.z = z.unwrap_or(pose.z);
        Ok(response)
    }

    /// Linear move to the given coordinates; omitted axes stay put.
    pub fn move_absolute(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        feedrate: Option<f64>,
    ) -> Result<Response, MotionError> {
        let _seq = lock(&self.sequence);
        self.move_absolute_unlocked(x, y, z, self.feedrate_or_default(feedrate))
    }

    /// Linear move by an offset. Absolute mode is restored on every exit.
    pub fn move_relative(
        &self,
        dx: f64,
        dy: f64,
        dz: f64,
        feedrate: Option<f64>,
    ) -> Result<Response, MotionError> {
        let _seq = lock(&self.sequence);
        let command = Command::LinearMove {
            x: Some(dx),
            y: Some(dy),
            z: Some(dz),
            feedrate: self.feedrate_or_default(feedrate),
        };
        let response = {
            let _relative = RelativeMode::enter(&self.protocol)?;
            acknowledged(self.protocol.send(&command)?)?
        };
        let mut pose = lock(&self.pose);
        *pose = pose.offset(dx, dy, dz);
        Ok(response)
    }

    /// Step a single axis by `step` mm.
    pub fn jog(&self, axis: Axis, step: f64, feedrate: Option<f64>) -> Result<Response, MotionError> {
        let (dx, dy, dz) = match axis {
            Axis::X => (step, 0.0, 0.0),
            Axis::Y => (0.0, step, 0.0),
            Axis::Z => (0.0, 0.0, step),
        };
        self.move_relative(dx, dy, dz, feedrate)
    }

    pub fn home(&self) -> Result<Response, MotionError> {
        let _seq = lock(&self.sequence);
        let response = acknowledged(self.protocol.send(&Command::Home)?)?;
        self.set_pose(RobotPose::home(self.config.home_z));
        info!("homed");
        Ok(response)
    }

    fn dwell_unlocked(&self, duration: Duration) -> Result<Option<Response>, MotionError> {
        if duration.is_zero() {
            return Ok(None);
        }
        let response = acknowledged(self.protocol.send(&Command::Dwell(duration))?)?;
        Ok(Some(response))
    }

    /// Pause motion. A zero duration sends nothing.
    pub fn dwell(&self, duration: Duration) -> Result<Option<Response>, MotionError> {
        let _seq = lock(&self.sequence);
        self.dwell_unlocked(duration)
    }

    fn safe_travel_unlocked(
        &self,
        procedure: Procedure,
        x: f64,
        y: f64,
        safe_z: f64,
        feedrate: f64,
    ) -> Result<Vec<Response>, MotionError> {
        let abort = |step: SequenceStep| {
            move |source: MotionError| MotionError::Aborted {
                procedure,
                step,
                source: Box::new(source),
            }
        };
        let raise = self
            .move_absolute_unlocked(None, None, Some(safe_z), feedrate)
            .map_err(abort(SequenceStep::RaiseToSafe))?;
        let travel = self
            .move_absolute_unlocked(Some(x), Some(y), None, feedrate)
            .map_err(abort(SequenceStep::TravelXY))?;
        Ok(vec![raise, travel])
    }

    /// Raise to `safe_z`, then move in XY.
    pub fn safe_travel(
        &self,
        x: f64,
        y: f64,
        safe_z: f64,
        feedrate: Option<f64>,
    ) -> Result<Vec<Response>, MotionError> {
        let _seq = lock(&self.sequence);
        self.safe_travel_unlocked(
            Procedure::SafeTravel,
            x,
            y,
            safe_z,
            self.feedrate_or_default(feedrate),
        )
    }

    /// Raise, travel, press, hold, lift.
    ///
    /// Stops at the first step the device does not acknowledge; the tracked
    /// pose reflects the completed steps only. No recovery move is issued.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn touch_sequence(&self, request: &TouchRequest) -> Result<Vec<Response>, MotionError> {
        let _seq = lock(&self.sequence);
        let feedrate = request.feedrate;
        let abort = |step: SequenceStep| {
            move |source: MotionError| MotionError::Aborted {
                procedure: Procedure::Touch,
                step,
                source: Box::new(source),
            }
        };

        let mut responses = self.safe_travel_unlocked(
            Procedure::Touch,
            request.x,
            request.y,
            request.safe_z,
            feedrate,
        )?;
        responses.push(
            self.move_absolute_unlocked(None, None, Some(request.contact_z()), feedrate)
                .map_err(abort(SequenceStep::Lower))?,
        );
        if let Some(dwell) = self
            .dwell_unlocked(request.touch_duration)
            .map_err(abort(SequenceStep::Dwell))?
        {
            responses.push(dwell);
        }
        responses.push(
            self.move_absolute_unlocked(None, None, Some(request.safe_z), feedrate)
                .map_err(abort(SequenceStep::Lift))?,
        );

        info!(
            "touched ({:.3}, {:.3}) at z {:.3}",
            request.x,
            request.y,
            request.contact_z()
        );
        Ok(responses)
    }
}

impl Drop for RobotSession {
    fn drop(&mut self) {
        self.protocol.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use approx::assert_relative_eq;

    fn fast_protocol() -> ProtocolConfig {
        ProtocolConfig {
            settle_ms: 0,
            handshake_timeout_ms: 50,
            response_timeout_ms: 50,
            ..ProtocolConfig::default()
        }
    }

    fn connected() -> (RobotSession, crate::mock::ScriptHandle) {
        let (transport, handle) = ScriptedTransport::delta();
        let session = RobotSession::new(fast_protocol(), RobotConfig::default());
        session.connect(Box::new(transport)).unwrap();
        (session, handle)
    }

    /// Passes the handshake, then fails every write of `G90`.
    struct BrokenAfterHandshake {
        unread: Option<String>,
    }

    impl LineTransport for BrokenAfterHandshake {
        fn discard_input(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn write_line(&mut self, line: &str) -> std::io::Result<()> {
            match line {
                "IsDelta" => {
                    self.unread = Some("YesDelta".to_string());
                    Ok(())
                }
                "G90" => Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)),
                _ => Ok(()),
            }
        }

        fn read_line(&mut self, _timeout: Duration) -> std::io::Result<Option<String>> {
            Ok(self.unread.take())
        }
    }

    #[test]
    fn failed_mode_select_closes_the_link() {
        let session = RobotSession::new(fast_protocol(), RobotConfig::default());
        let err = session
            .connect(Box::new(BrokenAfterHandshake { unread: None }))
            .unwrap_err();
        assert!(matches!(
            err,
            MotionError::Protocol(crate::ProtocolError::Io(_))
        ));
        assert!(!session.is_connected());
        assert!(session.home().unwrap_err().is_not_connected());
    }

    #[test]
    fn connect_resets_pose_and_selects_absolute_mode() {
        let (session, handle) = connected();
        assert_eq!(session.pose(), RobotPose::home(-291.28));
        assert_eq!(handle.sent(), vec!["IsDelta", "G90"]);
    }

    #[test]
    fn moves_use_default_feedrate_and_track_pose() {
        let (session, handle) = connected();
        session
            .move_absolute(Some(10.0), None, Some(-300.0), None)
            .unwrap();
        assert_eq!(handle.sent().last().unwrap(), "G01 X10.000 Z-300.000 F2000");
        assert_eq!(session.pose(), RobotPose::new(10.0, 0.0, -300.0));
    }

    #[test]
    fn relative_move_is_bracketed_by_mode_switches() {
        let (session, handle) = connected();
        session.move_relative(1.0, -2.0, 0.5, Some(600.0)).unwrap();
        assert_eq!(
            handle.sent()[2..],
            ["G91", "G01 X1.000 Y-2.000 Z0.500 F600", "G90"]
        );
        let pose = session.pose();
        assert_eq!((pose.x, pose.y), (1.0, -2.0));
        assert_relative_eq!(pose.z, -290.78, epsilon = 1e-9);
    }

    #[test]
    fn jog_moves_one_axis() {
        let (session, handle) = connected();
        session.jog(Axis::Y, 10.0, None).unwrap();
        assert!(handle
            .sent()
            .contains(&"G01 X0.000 Y10.000 Z0.000 F2000".to_string()));
        assert_eq!(session.pose().y, 10.0);
    }

    #[test]
    fn zero_dwell_sends_nothing() {
        let (session, handle) = connected();
        assert!(session.dwell(Duration::ZERO).unwrap().is_none());
        assert_eq!(handle.sent().len(), 2);
        session.dwell(Duration::from_millis(250)).unwrap();
        assert_eq!(handle.sent().last().unwrap(), "G04 P250");
    }

    #[test]
    fn rejected_move_keeps_pose() {
        let (transport, _handle) = ScriptedTransport::new(|line| match line {
            "IsDelta" => vec!["YesDelta".into()],
            "G90" | "G91" => vec![],
            _ => vec!["error: unreachable".into()],
        });
        let session = RobotSession::new(fast_protocol(), RobotConfig::default());
        session.connect(Box::new(transport)).unwrap();

        let err = session
            .move_absolute(Some(500.0), None, None, None)
            .unwrap_err();
        assert!(matches!(err, MotionError::Rejected { ref reply, .. } if reply == "error: unreachable"));
        assert_eq!(session.pose(), RobotPose::home(-291.28));
    }

    #[test]
    fn get_position_resyncs_from_report() {
        let (transport, _handle) = ScriptedTransport::new(|line| match line {
            "IsDelta" => vec!["YesDelta".into()],
            "M114" => vec!["X:3.00 Y:4.00 Z:-280.00 E:0.00".into(), "ok".into()],
            _ => vec![],
        });
        let session = RobotSession::new(fast_protocol(), RobotConfig::default());
        session.connect(Box::new(transport)).unwrap();

        let pose = session.get_position().unwrap();
        assert_eq!(pose, RobotPose::new(3.0, 4.0, -280.0));
        assert_eq!(session.pose(), pose);
    }

    #[test]
    fn get_position_offline_returns_tracked_pose() {
        let session = RobotSession::new(fast_protocol(), RobotConfig::default());
        assert_eq!(session.get_position().unwrap(), RobotPose::home(-291.28));
    }

    #[test]
    fn touch_request_contact_depth() {
        let request = TouchRequest {
            x: 0.0,
            y: 0.0,
            phone_z: -340.0,
            touch_force: 1.5,
            touch_duration: Duration::from_millis(100),
            safe_z: -330.0,
            feedrate: 6000.0,
        };
        assert_eq!(request.contact_z(), -341.5);
    }
}
