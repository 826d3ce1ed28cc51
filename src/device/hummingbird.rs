//! Classic Hummingbird (Duo) façade.
//!
//! Shares the Finch server. The server drives a single controller, so paths
//! carry no device segment and every key uses the link's default device.

use crate::config::ResolvedSettings;
use crate::dispatch::Submission;
use crate::error::LinkResult;
use crate::key::{OutputKind, OutputValue, PortSensor, QueryKey, Sensor, TargetKey};
use crate::link::{Link, Protocol};

use super::{as_number, clamp_round, encode_component};

pub const LED_PORTS: std::ops::RangeInclusive<u8> = 1..=4;
pub const TRI_LED_PORTS: std::ops::RangeInclusive<u8> = 1..=2;
pub const MOTOR_PORTS: std::ops::RangeInclusive<u8> = 1..=2;
pub const VIBRATION_PORTS: std::ops::RangeInclusive<u8> = 1..=2;
pub const SERVO_PORTS: std::ops::RangeInclusive<u8> = 1..=4;

/// Light, dial and voltage share the server's generic `sensor` reading.
fn port_sensor_name(kind: PortSensor) -> &'static str {
    match kind {
        PortSensor::Distance => "distance",
        PortSensor::Sound => "sound",
        PortSensor::Temperature => "temperature",
        PortSensor::Light | PortSensor::Dial | PortSensor::Voltage => "sensor",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HummingbirdProtocol;

impl Protocol for HummingbirdProtocol {
    fn name(&self) -> &'static str {
        "hummingbird"
    }

    fn accepts(&self, key: &TargetKey, value: &OutputValue) -> bool {
        key.port.is_some()
            && matches!(
                (key.kind, value),
                (OutputKind::Led, OutputValue::Level(_))
                    | (OutputKind::Motors, OutputValue::Level(_))
                    | (OutputKind::Vibration, OutputValue::Level(_))
                    | (OutputKind::ServoPosition, OutputValue::Level(_))
                    | (OutputKind::TriLed, OutputValue::Rgb(..))
            )
    }

    fn output_path(&self, key: &TargetKey, value: &OutputValue) -> String {
        let command = match key.kind {
            OutputKind::Motors => "motor",
            other => other.name(),
        };
        let mut path = format!("/hummingbird/out/{}", command);
        if let Some(port) = key.port {
            path.push_str(&format!("/{}", port));
        }
        for segment in value.segments() {
            path.push('/');
            path.push_str(&encode_component(&segment));
        }
        path
    }

    fn query_path(&self, key: &QueryKey) -> Option<String> {
        match key.sensor {
            Sensor::Port { kind, port } => {
                Some(format!("/hummingbird/in/{}/{}", port_sensor_name(kind), port))
            }
            _ => None,
        }
    }

    fn safe_value(&self, key: &TargetKey) -> Option<OutputValue> {
        match key.kind {
            OutputKind::Led | OutputKind::Motors | OutputKind::Vibration => {
                Some(OutputValue::Level(0))
            }
            OutputKind::TriLed => Some(OutputValue::Rgb(0, 0, 0)),
            _ => None,
        }
    }
}

pub struct Hummingbird {
    link: Link<HummingbirdProtocol>,
}

impl Hummingbird {
    pub fn connect(settings: &ResolvedSettings) -> LinkResult<Self> {
        Link::connect(settings, HummingbirdProtocol).map(Self::new)
    }

    pub fn new(link: Link<HummingbirdProtocol>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Link<HummingbirdProtocol> {
        &self.link
    }

    pub fn into_link(self) -> Link<HummingbirdProtocol> {
        self.link
    }

    fn set_port(&self, port: u8, kind: OutputKind, value: OutputValue) -> LinkResult<Submission> {
        let key = TargetKey::new(self.link.default_device().clone(), Some(port), kind);
        self.link.submit(key, value)
    }

    /// Single-color LED intensity in percent.
    pub fn set_led(&self, port: u8, intensity: f64) -> LinkResult<Submission> {
        self.set_port(port, OutputKind::Led, OutputValue::Level(clamp_round(intensity, 0, 100)))
    }

    /// Tri-color LED, each channel in percent.
    pub fn set_tri_led(&self, port: u8, red: f64, green: f64, blue: f64) -> LinkResult<Submission> {
        self.set_port(
            port,
            OutputKind::TriLed,
            OutputValue::Rgb(
                clamp_round(red, 0, 100),
                clamp_round(green, 0, 100),
                clamp_round(blue, 0, 100),
            ),
        )
    }

    /// Servo angle in degrees, `0..=180`.
    pub fn set_servo(&self, port: u8, angle: f64) -> LinkResult<Submission> {
        self.set_port(
            port,
            OutputKind::ServoPosition,
            OutputValue::Level(clamp_round(angle, 0, 180)),
        )
    }

    /// Motor speed in percent, `-100..=100`.
    pub fn set_motor(&self, port: u8, speed: f64) -> LinkResult<Submission> {
        self.set_port(port, OutputKind::Motors, OutputValue::Level(clamp_round(speed, -100, 100)))
    }

    pub fn set_vibration(&self, port: u8, intensity: f64) -> LinkResult<Submission> {
        self.set_port(
            port,
            OutputKind::Vibration,
            OutputValue::Level(clamp_round(intensity, 0, 100)),
        )
    }

    /// Have the host computer speak `text`. Not coalesced; not awaited.
    pub fn speak(&self, text: &str) {
        self.link.fire(format!("/speak/{}", encode_component(text)));
    }

    pub async fn sensor(&self, kind: PortSensor, port: u8) -> LinkResult<f64> {
        let key = QueryKey::new(self.link.default_device().clone(), Sensor::Port { kind, port });
        as_number(&self.link.read(&key).await?)
    }

    /// Zero every LED, motor, vibration motor and tri-LED port, used or not.
    /// Servos keep their angle.
    pub fn stop(&self) -> LinkResult<usize> {
        let mut submitted = 0;
        for port in LED_PORTS {
            self.set_led(port, 0.0)?;
            submitted += 1;
        }
        for port in MOTOR_PORTS {
            self.set_motor(port, 0.0)?;
            submitted += 1;
        }
        for port in VIBRATION_PORTS {
            self.set_vibration(port, 0.0)?;
            submitted += 1;
        }
        for port in TRI_LED_PORTS {
            self.set_tri_led(port, 0.0, 0.0, 0.0)?;
            submitted += 1;
        }
        Ok(submitted)
    }
}
