//! Keys scoping dispatch slots and cache entries.
//!
//! A `TargetKey` names one independent actuator, a `QueryKey` one independent
//! sensor reading. Keys are discovered lazily, so both are plain hashable
//! values used as map keys rather than indices into a fixed table.

use std::fmt;

/// Identity of one robot attached to the control server.
///
/// Servers that drive a single robot use the implicit device `A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self("A".to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which command an actuator key carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    Motors,
    Led,
    TriLed,
    Buzzer,
    ServoPosition,
    ServoRotation,
    Vibration,
    Symbol,
}

impl OutputKind {
    pub fn name(self) -> &'static str {
        match self {
            OutputKind::Motors => "motors",
            OutputKind::Led => "led",
            OutputKind::TriLed => "triled",
            OutputKind::Buzzer => "buzzer",
            OutputKind::ServoPosition => "servo",
            OutputKind::ServoRotation => "rotation",
            OutputKind::Vibration => "vibration",
            OutputKind::Symbol => "symbol",
        }
    }
}

/// Identifier of one independent actuator: (device, port, command kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub device: DeviceId,
    /// `None` for actuators that have no port (Finch motors, micro:bit display).
    pub port: Option<u8>,
    pub kind: OutputKind,
}

impl TargetKey {
    pub fn new(device: DeviceId, port: Option<u8>, kind: OutputKind) -> Self {
        Self { device, port, kind }
    }

    /// Key for a port-less actuator on the implicit device.
    pub fn implicit(kind: OutputKind) -> Self {
        Self::new(DeviceId::default(), None, kind)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}/{}/{}", self.device, self.kind.name(), port),
            None => write!(f, "{}/{}", self.device, self.kind.name()),
        }
    }
}

/// A fully-resolved output payload.
///
/// Values are compared structurally: resubmitting an equal value while it is
/// in flight collapses into the outstanding send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputValue {
    /// A single intensity, angle or speed.
    Level(i32),
    /// Left/right pair (Finch motors).
    Pair(i32, i32),
    /// Red/green/blue intensities.
    Rgb(i32, i32, i32),
    /// Buzzer frequency and duration.
    Tone { hz: u16, ms: u16 },
    /// 5x5 LED matrix, row-major.
    Pattern(Vec<bool>),
}

impl OutputValue {
    /// Path segments carrying this value, in request order.
    pub fn segments(&self) -> Vec<String> {
        match self {
            OutputValue::Level(level) => vec![level.to_string()],
            OutputValue::Pair(left, right) => vec![left.to_string(), right.to_string()],
            OutputValue::Rgb(r, g, b) => vec![r.to_string(), g.to_string(), b.to_string()],
            OutputValue::Tone { hz, ms } => vec![hz.to_string(), ms.to_string()],
            OutputValue::Pattern(pixels) => pixels.iter().map(|on| on.to_string()).collect(),
        }
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Level(level) => write!(f, "{}", level),
            OutputValue::Pair(left, right) => write!(f, "({}, {})", left, right),
            OutputValue::Rgb(r, g, b) => write!(f, "rgb({}, {}, {})", r, g, b),
            OutputValue::Tone { hz, ms } => write!(f, "{}Hz/{}ms", hz, ms),
            OutputValue::Pattern(pixels) => {
                let bits: String = pixels.iter().map(|&on| if on { '1' } else { '0' }).collect();
                f.write_str(&bits)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

/// Sensors plugged into a numbered Hummingbird port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortSensor {
    Light,
    Dial,
    Distance,
    Sound,
    Voltage,
    /// Classic Hummingbird only.
    Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    A,
    B,
}

/// micro:bit tilt states reported by the Hummingbird Bit server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tilt {
    ScreenUp,
    ScreenDown,
    TiltLeft,
    TiltRight,
    LogoUp,
    LogoDown,
    Shake,
}

/// One sensor channel, including whatever selects it (port, side, axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sensor {
    Temperature,
    Obstacle(Side),
    Light(Side),
    Acceleration(Axis),
    Port { kind: PortSensor, port: u8 },
    Accelerometer(Axis),
    Magnetometer(Axis),
    Button(Button),
    Tilt(Tilt),
    Compass,
}

/// Identifier of one independent sensor reading: (device, sensor channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub device: DeviceId,
    pub sensor: Sensor,
}

impl QueryKey {
    pub fn new(device: DeviceId, sensor: Sensor) -> Self {
        Self { device, sensor }
    }

    pub fn implicit(sensor: Sensor) -> Self {
        Self::new(DeviceId::default(), sensor)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.device, self.sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn implicit_device_is_a() {
        assert_eq!(DeviceId::default().as_str(), "A");
        assert_eq!(TargetKey::implicit(OutputKind::Motors).device, DeviceId::from("A"));
    }

    #[test]
    fn keys_differing_in_any_dimension_are_distinct() {
        let keys: HashSet<TargetKey> = [
            TargetKey::new("A".into(), Some(1), OutputKind::Led),
            TargetKey::new("A".into(), Some(2), OutputKind::Led),
            TargetKey::new("B".into(), Some(1), OutputKind::Led),
            TargetKey::new("A".into(), Some(1), OutputKind::Vibration),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn target_key_display_includes_port_when_present() {
        let key = TargetKey::new("B".into(), Some(3), OutputKind::ServoRotation);
        assert_eq!(key.to_string(), "B/rotation/3");
        assert_eq!(TargetKey::implicit(OutputKind::Motors).to_string(), "A/motors");
    }

    #[test]
    fn values_render_as_path_segments() {
        assert_eq!(OutputValue::Pair(-20, 40).segments(), vec!["-20", "40"]);
        assert_eq!(OutputValue::Tone { hz: 440, ms: 500 }.segments(), vec!["440", "500"]);
        assert_eq!(
            OutputValue::Pattern(vec![true, false]).segments(),
            vec!["true", "false"]
        );
    }

    #[test]
    fn pattern_value_displays_as_bits() {
        let value = OutputValue::Pattern(vec![true, false, true]);
        assert_eq!(value.to_string(), "101");
    }
}
