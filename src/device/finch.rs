//! Finch robot façade.
//!
//! The Finch server drives a single robot, so every key uses the link's
//! default device and no port.

use crate::cache::SensorValue;
use crate::config::ResolvedSettings;
use crate::dispatch::Submission;
use crate::error::LinkResult;
use crate::key::{Axis, OutputKind, OutputValue, QueryKey, Sensor, Side, TargetKey};
use crate::link::{Link, Protocol};

use super::orientation::{FinchOrientation, classify_finch};
use super::{as_bool, as_number, clamp_round, encode_component};

#[derive(Debug, Clone, Copy, Default)]
pub struct FinchProtocol;

impl Protocol for FinchProtocol {
    fn name(&self) -> &'static str {
        "finch"
    }

    fn accepts(&self, key: &TargetKey, value: &OutputValue) -> bool {
        key.port.is_none()
            && matches!(
                (key.kind, value),
                (OutputKind::Motors, OutputValue::Pair(..))
                    | (OutputKind::Led, OutputValue::Rgb(..))
                    | (OutputKind::Buzzer, OutputValue::Tone { .. })
            )
    }

    fn output_path(&self, key: &TargetKey, value: &OutputValue) -> String {
        let command = match key.kind {
            OutputKind::Motors => "motor",
            other => other.name(),
        };
        let mut path = format!("/finch/out/{}", command);
        for segment in value.segments() {
            path.push('/');
            path.push_str(&encode_component(&segment));
        }
        path
    }

    fn query_path(&self, key: &QueryKey) -> Option<String> {
        let name = match key.sensor {
            Sensor::Temperature => "temperature",
            Sensor::Obstacle(Side::Left) => "obstacleLeft",
            Sensor::Obstacle(Side::Right) => "obstacleRight",
            Sensor::Light(Side::Left) => "lightLeft",
            Sensor::Light(Side::Right) => "lightRight",
            Sensor::Acceleration(Axis::X) => "accelerationX",
            Sensor::Acceleration(Axis::Y) => "accelerationY",
            Sensor::Acceleration(Axis::Z) => "accelerationZ",
            _ => return None,
        };
        Some(format!("/finch/in/{}", name))
    }

    fn safe_value(&self, key: &TargetKey) -> Option<OutputValue> {
        match key.kind {
            OutputKind::Motors => Some(OutputValue::Pair(0, 0)),
            OutputKind::Led => Some(OutputValue::Rgb(0, 0, 0)),
            _ => None,
        }
    }
}

pub struct Finch {
    link: Link<FinchProtocol>,
}

impl Finch {
    /// Connect to the Finch server named in `settings`.
    pub fn connect(settings: &ResolvedSettings) -> LinkResult<Self> {
        Link::connect(settings, FinchProtocol).map(Self::new)
    }

    pub fn new(link: Link<FinchProtocol>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Link<FinchProtocol> {
        &self.link
    }

    pub fn into_link(self) -> Link<FinchProtocol> {
        self.link
    }

    fn target(&self, kind: OutputKind) -> TargetKey {
        TargetKey::new(self.link.default_device().clone(), None, kind)
    }

    fn query(&self, sensor: Sensor) -> QueryKey {
        QueryKey::new(self.link.default_device().clone(), sensor)
    }

    async fn read(&self, sensor: Sensor) -> LinkResult<SensorValue> {
        self.link.read(&self.query(sensor)).await
    }

    /// Wheel speeds in percent, `-100..=100`.
    pub fn set_motors(&self, left: f64, right: f64) -> LinkResult<Submission> {
        self.link.submit(
            self.target(OutputKind::Motors),
            OutputValue::Pair(clamp_round(left, -100, 100), clamp_round(right, -100, 100)),
        )
    }

    pub fn stop_motors(&self) -> LinkResult<Submission> {
        self.set_motors(0.0, 0.0)
    }

    /// Beak color, each channel in percent.
    pub fn set_beak(&self, red: f64, green: f64, blue: f64) -> LinkResult<Submission> {
        self.link.submit(
            self.target(OutputKind::Led),
            OutputValue::Rgb(
                clamp_round(red, 0, 100),
                clamp_round(green, 0, 100),
                clamp_round(blue, 0, 100),
            ),
        )
    }

    pub fn buzz(&self, hz: f64, ms: f64) -> LinkResult<Submission> {
        self.link.submit(
            self.target(OutputKind::Buzzer),
            OutputValue::Tone {
                hz: clamp_round(hz, 0, 0xFFFF) as u16,
                ms: clamp_round(ms, 0, 0xFFFF) as u16,
            },
        )
    }

    /// Have the host computer speak `text`. Not coalesced; not awaited.
    pub fn speak(&self, text: &str) {
        self.link.fire(format!("/speak/{}", encode_component(text)));
    }

    pub async fn temperature(&self) -> LinkResult<f64> {
        as_number(&self.read(Sensor::Temperature).await?)
    }

    pub async fn obstacle(&self, side: Side) -> LinkResult<bool> {
        as_bool(&self.read(Sensor::Obstacle(side)).await?)
    }

    pub async fn light(&self, side: Side) -> LinkResult<f64> {
        as_number(&self.read(Sensor::Light(side)).await?)
    }

    pub async fn acceleration(&self, axis: Axis) -> LinkResult<f64> {
        as_number(&self.read(Sensor::Acceleration(axis)).await?)
    }

    /// Read all three axes and classify the resting orientation.
    pub async fn orientation(&self) -> LinkResult<FinchOrientation> {
        let (x, y, z) = tokio::try_join!(
            self.acceleration(Axis::X),
            self.acceleration(Axis::Y),
            self.acceleration(Axis::Z),
        )?;
        Ok(classify_finch(x, y, z))
    }

    /// Stop the wheels and darken the beak, whether or not either was used.
    /// Returns how many actuators were sent a safe value.
    pub fn stop(&self) -> LinkResult<usize> {
        let submitted = [self.stop_motors()?, self.set_beak(0.0, 0.0, 0.0)?];
        Ok(submitted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() {
        let protocol = FinchProtocol;
        assert_eq!(
            protocol.output_path(
                &TargetKey::implicit(OutputKind::Motors),
                &OutputValue::Pair(-40, 100)
            ),
            "/finch/out/motor/-40/100"
        );
        assert_eq!(
            protocol.output_path(&TargetKey::implicit(OutputKind::Led), &OutputValue::Rgb(1, 2, 3)),
            "/finch/out/led/1/2/3"
        );
        assert_eq!(
            protocol.output_path(
                &TargetKey::implicit(OutputKind::Buzzer),
                &OutputValue::Tone { hz: 440, ms: 250 }
            ),
            "/finch/out/buzzer/440/250"
        );
    }

    #[test]
    fn query_paths() {
        let protocol = FinchProtocol;
        let path = |sensor| protocol.query_path(&QueryKey::implicit(sensor));
        assert_eq!(path(Sensor::Temperature).as_deref(), Some("/finch/in/temperature"));
        assert_eq!(
            path(Sensor::Obstacle(Side::Right)).as_deref(),
            Some("/finch/in/obstacleRight")
        );
        assert_eq!(
            path(Sensor::Acceleration(Axis::Z)).as_deref(),
            Some("/finch/in/accelerationZ")
        );
        assert_eq!(path(Sensor::Compass), None);
    }

    #[test]
    fn accepts_only_finch_actuators() {
        let protocol = FinchProtocol;
        assert!(protocol.accepts(&TargetKey::implicit(OutputKind::Motors), &OutputValue::Pair(0, 0)));
        assert!(!protocol.accepts(&TargetKey::implicit(OutputKind::Motors), &OutputValue::Level(0)));
        assert!(!protocol.accepts(&TargetKey::implicit(OutputKind::Vibration), &OutputValue::Level(0)));
        assert!(!protocol.accepts(
            &TargetKey::new("A".into(), Some(1), OutputKind::Led),
            &OutputValue::Rgb(0, 0, 0)
        ));
    }

    #[test]
    fn safe_values_cover_motors_and_beak() {
        let protocol = FinchProtocol;
        assert_eq!(
            protocol.safe_value(&TargetKey::implicit(OutputKind::Motors)),
            Some(OutputValue::Pair(0, 0))
        );
        assert_eq!(
            protocol.safe_value(&TargetKey::implicit(OutputKind::Led)),
            Some(OutputValue::Rgb(0, 0, 0))
        );
        assert_eq!(protocol.safe_value(&TargetKey::implicit(OutputKind::Buzzer)), None);
    }
}
