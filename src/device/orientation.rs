//! Finch orientation from its accelerometer.

use std::fmt;

/// Coarse resting orientation of a Finch, derived from acceleration in g.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinchOrientation {
    Level,
    UpsideDown,
    LeftWingDown,
    RightWingDown,
    BeakDown,
    BeakUp,
    InBetween,
}

impl FinchOrientation {
    pub fn label(self) -> &'static str {
        match self {
            FinchOrientation::Level => "level",
            FinchOrientation::UpsideDown => "upside down",
            FinchOrientation::LeftWingDown => "left wing down",
            FinchOrientation::RightWingDown => "right wing down",
            FinchOrientation::BeakDown => "beak down",
            FinchOrientation::BeakUp => "beak up",
            FinchOrientation::InBetween => "in between",
        }
    }
}

impl fmt::Display for FinchOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn within(value: f64, low: f64, high: f64) -> bool {
    value > low && value < high
}

/// Classify one acceleration sample. Bounds are exclusive.
pub fn classify_finch(x: f64, y: f64, z: f64) -> FinchOrientation {
    if within(x, -0.5, 0.5) {
        if within(y, -0.5, 0.5) {
            if within(z, 0.65, 1.5) {
                return FinchOrientation::Level;
            }
            if within(z, -1.5, -0.65) {
                return FinchOrientation::UpsideDown;
            }
        } else if within(z, -0.5, 0.5) {
            if within(y, 0.7, 1.5) {
                return FinchOrientation::LeftWingDown;
            }
            if within(y, -1.5, -0.7) {
                return FinchOrientation::RightWingDown;
            }
        }
    } else if within(y, -0.3, 0.3) && within(z, -0.3, 0.3) {
        if within(x, 0.8, 1.5) {
            return FinchOrientation::BeakDown;
        }
        if within(x, -1.5, -0.8) {
            return FinchOrientation::BeakUp;
        }
    }
    FinchOrientation::InBetween
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_on_a_table_is_level() {
        assert_eq!(classify_finch(0.0, 0.0, 1.0), FinchOrientation::Level);
        assert_eq!(classify_finch(0.1, -0.2, -1.0), FinchOrientation::UpsideDown);
    }

    #[test]
    fn wings_and_beak() {
        assert_eq!(classify_finch(0.0, 1.0, 0.0), FinchOrientation::LeftWingDown);
        assert_eq!(classify_finch(0.0, -1.0, 0.0), FinchOrientation::RightWingDown);
        assert_eq!(classify_finch(1.0, 0.0, 0.0), FinchOrientation::BeakDown);
        assert_eq!(classify_finch(-1.0, 0.1, -0.1), FinchOrientation::BeakUp);
    }

    #[test]
    fn boundaries_are_exclusive() {
        assert_eq!(classify_finch(0.0, 0.0, 0.65), FinchOrientation::InBetween);
        assert_eq!(classify_finch(0.0, 0.7, 0.0), FinchOrientation::InBetween);
        assert_eq!(classify_finch(0.5, 0.0, 0.0), FinchOrientation::InBetween);
    }

    #[test]
    fn labels() {
        assert_eq!(FinchOrientation::RightWingDown.to_string(), "right wing down");
        assert_eq!(FinchOrientation::InBetween.to_string(), "in between");
    }
}
