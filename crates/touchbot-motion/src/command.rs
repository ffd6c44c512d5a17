use std::fmt;
use std::time::Duration;

/// Robot axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        })
    }
}

/// The G-code vocabulary understood by the delta robot firmware.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `G90`
    AbsoluteMode,
    /// `G91`
    RelativeMode,
    /// `G01`; only the given axes are emitted, the feedrate (mm/min) always is.
    LinearMove {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        feedrate: f64,
    },
    /// `G28`
    Home,
    /// `G04 P<ms>`
    Dwell(Duration),
    /// `M114`
    QueryPosition,
}

impl Command {
    /// Mode switches are fire-and-forget; everything else is acknowledged.
    pub fn expects_ack(&self) -> bool {
        !matches!(self, Command::AbsoluteMode | Command::RelativeMode)
    }

    /// Dwell length in whole milliseconds, never below 1.
    pub fn dwell_millis(duration: Duration) -> u64 {
        (duration.as_secs_f64() * 1000.0).round().max(1.0) as u64
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::AbsoluteMode => f.write_str("G90"),
            Command::RelativeMode => f.write_str("G91"),
            Command::LinearMove { x, y, z, feedrate } => {
                f.write_str("G01")?;
                for (axis, value) in [(Axis::X, x), (Axis::Y, y), (Axis::Z, z)] {
                    if let Some(v) = value {
                        write!(f, " {axis}{v:.3}")?;
                    }
                }
                write!(f, " F{feedrate}")
            }
            Command::Home => f.write_str("G28"),
            Command::Dwell(d) => write!(f, "G04 P{}", Command::dwell_millis(*d)),
            Command::QueryPosition => f.write_str("M114"),
        }
    }
}

/// G-code feedrates are mm/min; operators think in mm/s.
pub fn feedrate_from_speed(mm_per_s: f64) -> f64 {
    (mm_per_s * 60.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_move_emits_only_given_axes() {
        let cmd = Command::LinearMove {
            x: None,
            y: Some(-12.5),
            z: Some(-330.0),
            feedrate: 2000.0,
        };
        assert_eq!(cmd.to_string(), "G01 Y-12.500 Z-330.000 F2000");
    }

    #[test]
    fn fractional_feedrate_is_kept() {
        let cmd = Command::LinearMove {
            x: Some(1.0),
            y: None,
            z: None,
            feedrate: 1234.5,
        };
        assert_eq!(cmd.to_string(), "G01 X1.000 F1234.5");
    }

    #[test]
    fn dwell_rounds_to_millis_with_floor_of_one() {
        assert_eq!(Command::Dwell(Duration::from_millis(100)).to_string(), "G04 P100");
        assert_eq!(Command::Dwell(Duration::from_micros(200)).to_string(), "G04 P1");
    }

    #[test]
    fn mode_switches_are_not_acknowledged() {
        assert!(!Command::AbsoluteMode.expects_ack());
        assert!(!Command::RelativeMode.expects_ack());
        assert!(Command::Home.expects_ack());
        assert!(Command::QueryPosition.expects_ack());
    }

    #[test]
    fn speed_converts_to_feedrate() {
        assert_eq!(feedrate_from_speed(100.0), 6000.0);
        assert_eq!(feedrate_from_speed(0.0), 1.0);
    }
}
