//! Hummingbird Bit façade.
//!
//! One server can drive several micro:bit-based controllers (`A`, `B`, `C`),
//! so every operation names its device explicitly.

use crate::cache::SensorValue;
use crate::config::ResolvedSettings;
use crate::dispatch::Submission;
use crate::error::{LinkError, LinkResult};
use crate::key::{
    Axis, Button, DeviceId, OutputKind, OutputValue, PortSensor, QueryKey, Sensor, TargetKey, Tilt,
};
use crate::link::{Link, Protocol};

use super::{as_bool, as_number, clamp_round, encode_component, encode_path};

/// LEDs in the micro:bit display matrix.
pub const SYMBOL_PIXELS: usize = 25;

pub const LED_PORTS: std::ops::RangeInclusive<u8> = 1..=4;
pub const TRI_LED_PORTS: std::ops::RangeInclusive<u8> = 1..=2;
pub const SERVO_PORTS: std::ops::RangeInclusive<u8> = 1..=4;

const NOTE_TEMPO_BPM: f64 = 60.0;

fn port_sensor_name(kind: PortSensor) -> Option<&'static str> {
    Some(match kind {
        PortSensor::Light => "light",
        PortSensor::Dial => "dial",
        PortSensor::Distance => "distance",
        PortSensor::Sound => "sound",
        PortSensor::Voltage => "voltage",
        PortSensor::Temperature => return None,
    })
}

fn tilt_name(tilt: Tilt) -> &'static str {
    match tilt {
        Tilt::ScreenUp => "Screen Up",
        Tilt::ScreenDown => "Screen Down",
        Tilt::TiltLeft => "Tilt Left",
        Tilt::TiltRight => "Tilt Right",
        Tilt::LogoUp => "Logo Up",
        Tilt::LogoDown => "Logo Down",
        Tilt::Shake => "Shake",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HummingbirdBitProtocol;

impl Protocol for HummingbirdBitProtocol {
    fn name(&self) -> &'static str {
        "hummingbird-bit"
    }

    fn accepts(&self, key: &TargetKey, value: &OutputValue) -> bool {
        match (key.kind, key.port, value) {
            (OutputKind::Led, Some(_), OutputValue::Level(_))
            | (OutputKind::ServoPosition, Some(_), OutputValue::Level(_))
            | (OutputKind::ServoRotation, Some(_), OutputValue::Level(_))
            | (OutputKind::Vibration, Some(_), OutputValue::Level(_))
            | (OutputKind::TriLed, Some(_), OutputValue::Rgb(..)) => true,
            (OutputKind::Symbol, None, OutputValue::Pattern(pixels)) => {
                pixels.len() == SYMBOL_PIXELS
            }
            _ => false,
        }
    }

    fn output_path(&self, key: &TargetKey, value: &OutputValue) -> String {
        let device = encode_component(key.device.as_str());
        let values = value
            .segments()
            .iter()
            .map(|segment| encode_component(segment))
            .collect::<Vec<_>>()
            .join("/");
        match key.port {
            Some(port) => format!(
                "/hummingbird/out/{}/{}/{}/{}",
                key.kind.name(),
                port,
                values,
                device
            ),
            None => format!("/hummingbird/out/{}/{}/{}", key.kind.name(), device, values),
        }
    }

    fn query_path(&self, key: &QueryKey) -> Option<String> {
        let device = encode_component(key.device.as_str());
        let path = match key.sensor {
            Sensor::Port { kind, port } => format!("{}/{}", port_sensor_name(kind)?, port),
            Sensor::Accelerometer(axis) => {
                format!("{}/{}", encode_path("Accelerometer m/s²"), axis.name())
            }
            Sensor::Magnetometer(axis) => {
                format!("{}/{}", encode_path("Magnetometer µT"), axis.name())
            }
            Sensor::Button(button) => format!(
                "button/{}",
                match button {
                    Button::A => "A",
                    Button::B => "B",
                }
            ),
            Sensor::Tilt(tilt) => format!("orientation/{}", encode_component(tilt_name(tilt))),
            Sensor::Compass => "Compass".to_string(),
            _ => return None,
        };
        Some(format!("/hummingbird/in/{}/{}", path, device))
    }

    fn safe_value(&self, key: &TargetKey) -> Option<OutputValue> {
        match key.kind {
            OutputKind::Led | OutputKind::ServoRotation | OutputKind::Vibration => {
                Some(OutputValue::Level(0))
            }
            OutputKind::TriLed => Some(OutputValue::Rgb(0, 0, 0)),
            _ => None,
        }
    }
}

/// Parse `#RRGGBB` (the `#` is optional) into channel bytes.
fn parse_hex_color(color: &str) -> LinkResult<(u8, u8, u8)> {
    let digits = color.trim().trim_start_matches('#');
    let invalid = || LinkError::parse(color, "expected a #RRGGBB color");
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn byte_to_percent(byte: u8) -> f64 {
    (f64::from(byte) * 100.0 / 255.0).round()
}

pub struct HummingbirdBit {
    link: Link<HummingbirdBitProtocol>,
}

impl HummingbirdBit {
    pub fn connect(settings: &ResolvedSettings) -> LinkResult<Self> {
        Link::connect(settings, HummingbirdBitProtocol).map(Self::new)
    }

    pub fn new(link: Link<HummingbirdBitProtocol>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Link<HummingbirdBitProtocol> {
        &self.link
    }

    pub fn into_link(self) -> Link<HummingbirdBitProtocol> {
        self.link
    }

    fn set_port(
        &self,
        device: &DeviceId,
        port: u8,
        kind: OutputKind,
        value: OutputValue,
    ) -> LinkResult<Submission> {
        self.link
            .submit(TargetKey::new(device.clone(), Some(port), kind), value)
    }

    async fn read(&self, device: &DeviceId, sensor: Sensor) -> LinkResult<SensorValue> {
        self.link.read(&QueryKey::new(device.clone(), sensor)).await
    }

    /// Single-color LED intensity in percent.
    pub fn set_led(&self, device: &DeviceId, port: u8, intensity: f64) -> LinkResult<Submission> {
        self.set_port(
            device,
            port,
            OutputKind::Led,
            OutputValue::Level(clamp_round(intensity, 0, 100)),
        )
    }

    /// Tri-color LED, each channel in percent.
    pub fn set_tri_led(
        &self,
        device: &DeviceId,
        port: u8,
        red: f64,
        green: f64,
        blue: f64,
    ) -> LinkResult<Submission> {
        self.set_port(
            device,
            port,
            OutputKind::TriLed,
            OutputValue::Rgb(
                clamp_round(red, 0, 100),
                clamp_round(green, 0, 100),
                clamp_round(blue, 0, 100),
            ),
        )
    }

    /// Tri-color LED from a color picker value such as `#FF8000`.
    pub fn set_tri_led_hex(&self, device: &DeviceId, port: u8, color: &str) -> LinkResult<Submission> {
        let (red, green, blue) = parse_hex_color(color)?;
        self.set_tri_led(
            device,
            port,
            byte_to_percent(red),
            byte_to_percent(green),
            byte_to_percent(blue),
        )
    }

    /// Position servo angle in degrees, `0..=180`.
    pub fn set_servo_position(&self, device: &DeviceId, port: u8, angle: f64) -> LinkResult<Submission> {
        self.set_port(
            device,
            port,
            OutputKind::ServoPosition,
            OutputValue::Level(clamp_round(angle, 0, 180)),
        )
    }

    /// Rotation servo speed in percent, `-100..=100`.
    pub fn set_servo_rotation(&self, device: &DeviceId, port: u8, speed: f64) -> LinkResult<Submission> {
        self.set_port(
            device,
            port,
            OutputKind::ServoRotation,
            OutputValue::Level(clamp_round(speed, -100, 100)),
        )
    }

    pub fn set_vibration(&self, device: &DeviceId, port: u8, intensity: f64) -> LinkResult<Submission> {
        self.set_port(
            device,
            port,
            OutputKind::Vibration,
            OutputValue::Level(clamp_round(intensity, 0, 100)),
        )
    }

    /// Show a 5x5 pattern given row-major as 25 characters, `1` lit.
    pub fn display_symbol(&self, device: &DeviceId, pattern: &str) -> LinkResult<Submission> {
        let pixels: Vec<bool> = pattern.trim().chars().map(|c| c == '1').collect();
        if pixels.len() != SYMBOL_PIXELS {
            return Err(LinkError::parse(
                pattern,
                format!("expected {} pixels, got {}", SYMBOL_PIXELS, pixels.len()),
            ));
        }
        self.link.submit(
            TargetKey::new(device.clone(), None, OutputKind::Symbol),
            OutputValue::Pattern(pixels),
        )
    }

    /// Scroll `text` across the micro:bit display.
    pub async fn display_text(&self, device: &DeviceId, text: &str) -> LinkResult<()> {
        self.link
            .send_once(&format!(
                "/hummingbird/out/print/{}/{}",
                encode_component(text),
                encode_component(device.as_str())
            ))
            .await
            .map(drop)
    }

    /// Play MIDI `note` for `beats` beats at 60 bpm.
    pub async fn play_note(&self, device: &DeviceId, note: u8, beats: f64) -> LinkResult<()> {
        let ms = (60_000.0 / NOTE_TEMPO_BPM * beats).round().max(0.0) as u64;
        self.link
            .send_once(&format!(
                "/hummingbird/out/playnote/{}/{}/{}",
                note,
                ms,
                encode_component(device.as_str())
            ))
            .await
            .map(drop)
    }

    /// Have the host computer speak `text`. Not coalesced; not awaited.
    pub fn speak(&self, text: &str) {
        self.link.fire(format!("/speak/{}", encode_component(text)));
    }

    pub async fn port_sensor(&self, device: &DeviceId, kind: PortSensor, port: u8) -> LinkResult<f64> {
        as_number(&self.read(device, Sensor::Port { kind, port }).await?)
    }

    pub async fn accelerometer(&self, device: &DeviceId, axis: Axis) -> LinkResult<f64> {
        as_number(&self.read(device, Sensor::Accelerometer(axis)).await?)
    }

    pub async fn magnetometer(&self, device: &DeviceId, axis: Axis) -> LinkResult<f64> {
        as_number(&self.read(device, Sensor::Magnetometer(axis)).await?)
    }

    pub async fn button(&self, device: &DeviceId, button: Button) -> LinkResult<bool> {
        as_bool(&self.read(device, Sensor::Button(button)).await?)
    }

    pub async fn tilted(&self, device: &DeviceId, tilt: Tilt) -> LinkResult<bool> {
        as_bool(&self.read(device, Sensor::Tilt(tilt)).await?)
    }

    /// Compass heading in degrees.
    pub async fn compass(&self, device: &DeviceId) -> LinkResult<f64> {
        as_number(&self.read(device, Sensor::Compass).await?)
    }

    /// Return every used actuator with a safe value to it. Position servos and
    /// the display are left as they are.
    pub fn stop(&self) -> usize {
        self.link.halt_all()
    }

    /// Send safe values to every LED, tri-LED and rotation servo port of
    /// `device`, used or not.
    pub fn stop_device(&self, device: &DeviceId) -> LinkResult<usize> {
        let mut submitted = 0;
        for port in LED_PORTS {
            self.set_led(device, port, 0.0)?;
            submitted += 1;
        }
        for port in TRI_LED_PORTS {
            self.set_tri_led(device, port, 0.0, 0.0, 0.0)?;
            submitted += 1;
        }
        for port in SERVO_PORTS {
            self.set_servo_rotation(device, port, 0.0)?;
            submitted += 1;
        }
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_key(port: u8, kind: OutputKind) -> TargetKey {
        TargetKey::new("B".into(), Some(port), kind)
    }

    #[test]
    fn port_output_paths_end_with_device() {
        let protocol = HummingbirdBitProtocol;
        assert_eq!(
            protocol.output_path(&port_key(2, OutputKind::Led), &OutputValue::Level(75)),
            "/hummingbird/out/led/2/75/B"
        );
        assert_eq!(
            protocol.output_path(&port_key(1, OutputKind::TriLed), &OutputValue::Rgb(10, 20, 30)),
            "/hummingbird/out/triled/1/10/20/30/B"
        );
        assert_eq!(
            protocol.output_path(&port_key(4, OutputKind::ServoRotation), &OutputValue::Level(-50)),
            "/hummingbird/out/rotation/4/-50/B"
        );
    }

    #[test]
    fn symbol_path_lists_each_pixel() {
        let protocol = HummingbirdBitProtocol;
        let mut pixels = vec![false; SYMBOL_PIXELS];
        pixels[0] = true;
        let path = protocol.output_path(
            &TargetKey::new("A".into(), None, OutputKind::Symbol),
            &OutputValue::Pattern(pixels),
        );
        assert!(path.starts_with("/hummingbird/out/symbol/A/true/false/"));
        assert_eq!(path.matches('/').count(), 4 + SYMBOL_PIXELS);
    }

    #[test]
    fn symbol_requires_full_matrix() {
        let protocol = HummingbirdBitProtocol;
        let key = TargetKey::new("A".into(), None, OutputKind::Symbol);
        assert!(protocol.accepts(&key, &OutputValue::Pattern(vec![true; SYMBOL_PIXELS])));
        assert!(!protocol.accepts(&key, &OutputValue::Pattern(vec![true; 3])));
    }

    #[test]
    fn port_actuators_need_a_port() {
        let protocol = HummingbirdBitProtocol;
        assert!(!protocol.accepts(
            &TargetKey::new("A".into(), None, OutputKind::Led),
            &OutputValue::Level(1)
        ));
        assert!(!protocol.accepts(&port_key(1, OutputKind::Motors), &OutputValue::Pair(1, 1)));
    }

    #[test]
    fn query_paths_match_server_names() {
        let protocol = HummingbirdBitProtocol;
        let path = |sensor| protocol.query_path(&QueryKey::new("C".into(), sensor));
        assert_eq!(
            path(Sensor::Port { kind: PortSensor::Distance, port: 2 }).as_deref(),
            Some("/hummingbird/in/distance/2/C")
        );
        assert_eq!(
            path(Sensor::Accelerometer(Axis::Y)).as_deref(),
            Some("/hummingbird/in/Accelerometer%20m/s%C2%B2/Y/C")
        );
        assert_eq!(
            path(Sensor::Magnetometer(Axis::X)).as_deref(),
            Some("/hummingbird/in/Magnetometer%20%C2%B5T/X/C")
        );
        assert_eq!(
            path(Sensor::Button(Button::B)).as_deref(),
            Some("/hummingbird/in/button/B/C")
        );
        assert_eq!(
            path(Sensor::Tilt(Tilt::ScreenUp)).as_deref(),
            Some("/hummingbird/in/orientation/Screen%20Up/C")
        );
        assert_eq!(path(Sensor::Compass).as_deref(), Some("/hummingbird/in/Compass/C"));
        assert_eq!(path(Sensor::Temperature), None);
        assert_eq!(path(Sensor::Port { kind: PortSensor::Temperature, port: 1 }), None);
    }

    #[test]
    fn safe_values_skip_position_servos_and_display() {
        let protocol = HummingbirdBitProtocol;
        assert_eq!(
            protocol.safe_value(&port_key(1, OutputKind::Vibration)),
            Some(OutputValue::Level(0))
        );
        assert_eq!(
            protocol.safe_value(&port_key(1, OutputKind::TriLed)),
            Some(OutputValue::Rgb(0, 0, 0))
        );
        assert_eq!(protocol.safe_value(&port_key(1, OutputKind::ServoPosition)), None);
        assert_eq!(
            protocol.safe_value(&TargetKey::new("A".into(), None, OutputKind::Symbol)),
            None
        );
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FF8000").unwrap(), (255, 128, 0));
        assert_eq!(parse_hex_color("00ff00").unwrap(), (0, 255, 0));
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("#GG0000").is_err());
        assert_eq!(byte_to_percent(255), 100.0);
        assert_eq!(byte_to_percent(128), 50.0);
    }
}
