use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motion::{feedrate_from_speed, ProtocolConfig, RobotConfig, TouchRequest};
use crate::rectify::RectifyParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path such as `/dev/ttyUSB0` or `COM3`.
    pub port: Option<String>,
    pub baud_rate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
        }
    }
}

/// Operator-facing touch parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchSettings {
    /// Press depth below the screen surface, mm.
    pub touch_force: f64,
    pub touch_duration_s: f64,
    pub safe_z: f64,
    pub speed_mm_s: f64,
    /// Step used by jog commands, mm.
    pub jog_step: f64,
}

impl Default for TouchSettings {
    fn default() -> Self {
        Self {
            touch_force: 1.0,
            touch_duration_s: 0.1,
            safe_z: -350.0,
            speed_mm_s: 100.0,
            jog_step: 10.0,
        }
    }
}

impl TouchSettings {
    pub fn feedrate(&self) -> f64 {
        feedrate_from_speed(self.speed_mm_s)
    }

    /// Negative or non-finite durations collapse to no dwell.
    pub fn touch_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.touch_duration_s).unwrap_or(Duration::ZERO)
    }

    pub fn request(&self, x: f64, y: f64, phone_z: f64) -> TouchRequest {
        TouchRequest {
            x,
            y,
            phone_z,
            touch_force: self.touch_force,
            touch_duration: self.touch_duration(),
            safe_z: self.safe_z,
            feedrate: self.feedrate(),
        }
    }
}

/// Everything a touch station needs, stored as one JSON document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub serial: SerialSettings,
    pub protocol: ProtocolConfig,
    pub robot: RobotConfig,
    pub touch: TouchSettings,
    pub rectify: RectifyParams,
}

impl StationConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
