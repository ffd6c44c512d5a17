use serde::{Deserialize, Serialize};

/// Cartesian robot position in millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RobotPose {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The pose after homing: centred at the home height.
    pub const fn home(home_z: f64) -> Self {
        Self::new(0.0, 0.0, home_z)
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Parse an `M114` report such as `X:10.00 Y:-5.00 Z:-300.00 E:0.00`.
///
/// Returns `None` unless all three axes are present and numeric. The first
/// occurrence of each axis wins.
pub fn parse_position_report(line: &str) -> Option<RobotPose> {
    let axis = |prefix: &str| {
        line.split_whitespace()
            .find_map(|token| token.strip_prefix(prefix))
            .and_then(|value| value.parse::<f64>().ok())
    };
    Some(RobotPose::new(axis("X:")?, axis("Y:")?, axis("Z:")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_marlin_style_report() {
        let pose =
            parse_position_report("X:10.00 Y:-5.50 Z:-300.25 E:0.00 Count X:1 Y:2 Z:3").unwrap();
        assert_eq!(pose, RobotPose::new(10.0, -5.5, -300.25));
    }

    #[test]
    fn incomplete_or_garbled_reports_are_rejected() {
        assert_eq!(parse_position_report("ok"), None);
        assert_eq!(parse_position_report("X:1 Y:2"), None);
        assert_eq!(parse_position_report("X:1 Y:two Z:3"), None);
    }
}
