use std::path::Path;

use log::info;
use nalgebra::Point2;

use crate::config::StationConfig;
use crate::mapping::{
    CalibrationIoError, CalibrationPair, CalibrationRecord, CoordinateMapper, MappingError,
};
use crate::motion::{Axis, LineTransport, MotionError, ProtocolError, Response, RobotSession};

#[derive(thiserror::Error, Debug)]
pub enum StationError {
    #[error("no serial port configured")]
    NoSerialPort,
    #[error("phone z {phone_z:.3} mm is not below the home height {home_z:.3} mm")]
    PhoneZAboveHome { phone_z: f64, home_z: f64 },
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    CalibrationIo(#[from] CalibrationIoError),
    #[error(transparent)]
    Motion(#[from] MotionError),
}

/// The calibrated mapping and the robot it drives.
///
/// Touch targets are given in rectified-image pixels.
pub struct Station {
    config: StationConfig,
    mapper: CoordinateMapper,
    phone_z: f64,
    session: RobotSession,
}

impl Station {
    /// Starts uncalibrated with the phone assumed at the home height.
    pub fn new(config: StationConfig) -> Self {
        let session = RobotSession::new(config.protocol.clone(), config.robot.clone());
        Self {
            phone_z: config.robot.home_z,
            config,
            mapper: CoordinateMapper::new(),
            session,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn session(&self) -> &RobotSession {
        &self.session
    }

    /// Robot Z of the phone surface.
    pub fn phone_z(&self) -> f64 {
        self.phone_z
    }

    fn check_phone_z(&self, phone_z: f64) -> Result<(), StationError> {
        let home_z = self.config.robot.home_z;
        if phone_z.is_finite() && phone_z <= home_z {
            Ok(())
        } else {
            Err(StationError::PhoneZAboveHome { phone_z, home_z })
        }
    }

    /// Install a mapping and phone height. The phone must lie at or below
    /// the home height.
    pub fn set_calibration(
        &mut self,
        mapper: CoordinateMapper,
        phone_z: f64,
    ) -> Result<(), StationError> {
        self.check_phone_z(phone_z)?;
        self.mapper = mapper;
        self.phone_z = phone_z;
        Ok(())
    }

    pub fn set_phone_z(&mut self, phone_z: f64) -> Result<(), StationError> {
        self.check_phone_z(phone_z)?;
        self.phone_z = phone_z;
        Ok(())
    }

    fn reported_pose(&self) -> Result<crate::motion::RobotPose, StationError> {
        if !self.session.is_connected() {
            return Err(MotionError::from(ProtocolError::NotConnected).into());
        }
        Ok(self.session.get_position()?)
    }

    /// Take the phone height from the robot's reported Z, with the stylus
    /// resting on the screen.
    pub fn measure_phone_z(&mut self) -> Result<f64, StationError> {
        let z = self.reported_pose()?.z;
        self.set_phone_z(z)?;
        info!("phone z set to current position: {z:.3} mm");
        Ok(z)
    }

    /// Pair `image_point` with the robot's current XY.
    pub fn pair_at_current_position(
        &self,
        image_point: Point2<f64>,
    ) -> Result<CalibrationPair, StationError> {
        let pose = self.reported_pose()?;
        info!(
            "calibration point ({:.1}, {:.1}) px at robot ({:.2}, {:.2}) mm",
            image_point.x, image_point.y, pose.x, pose.y
        );
        Ok(CalibrationPair::new(image_point, Point2::new(pose.x, pose.y)))
    }

    /// Restore a saved calibration; the current one is kept on failure.
    pub fn load_calibration(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<CalibrationRecord, StationError> {
        let record = CalibrationRecord::load_json(path)?;
        let mapper = CoordinateMapper::from_record(&record)?;
        self.set_calibration(mapper, record.phone_z)?;
        info!("calibration loaded, phone at z {:.3}", record.phone_z);
        Ok(record)
    }

    /// Open the configured serial port.
    pub fn connect(&self) -> Result<(), StationError> {
        let port = self
            .config
            .serial
            .port
            .as_deref()
            .ok_or(StationError::NoSerialPort)?;
        self.session
            .connect_serial(port, self.config.serial.baud_rate)?;
        Ok(())
    }

    pub fn connect_with(&self, transport: Box<dyn LineTransport>) -> Result<(), StationError> {
        self.session.connect(transport)?;
        Ok(())
    }

    /// Robot XY (mm) for a rectified-image pixel.
    pub fn target(&self, image_point: Point2<f64>) -> Result<Point2<f64>, MappingError> {
        self.mapper.apply(image_point)
    }

    /// Tap the screen at a rectified-image pixel.
    pub fn touch(&self, image_point: Point2<f64>) -> Result<Vec<Response>, StationError> {
        let robot = self.target(image_point)?;
        let request = self.config.touch.request(robot.x, robot.y, self.phone_z);
        Ok(self.session.touch_sequence(&request)?)
    }

    /// Move above a rectified-image pixel at the safe height.
    pub fn travel(&self, image_point: Point2<f64>) -> Result<Vec<Response>, StationError> {
        let robot = self.target(image_point)?;
        let touch = &self.config.touch;
        Ok(self
            .session
            .safe_travel(robot.x, robot.y, touch.safe_z, Some(touch.feedrate()))?)
    }

    /// Jog one configured step along `axis`; `forward` picks the sign.
    pub fn jog(&self, axis: Axis, forward: bool) -> Result<Response, StationError> {
        let touch = &self.config.touch;
        let step = if forward {
            touch.jog_step
        } else {
            -touch.jog_step
        };
        Ok(self.session.jog(axis, step, Some(touch.feedrate()))?)
    }
}
