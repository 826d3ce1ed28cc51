//! Device façades over a [`Link`](crate::link::Link).
//!
//! Façades are ordinary callers of the core: they clamp host-supplied numbers,
//! build keys, and map keys onto the control server's URL scheme. They hold no
//! dispatch or cache state of their own.

pub mod finch;
pub mod hummingbird;
pub mod hummingbird_bit;
pub mod orientation;

pub use finch::{Finch, FinchProtocol};
pub use hummingbird::{Hummingbird, HummingbirdProtocol};
pub use hummingbird_bit::{HummingbirdBit, HummingbirdBitProtocol};
pub use orientation::FinchOrientation;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::cache::SensorValue;
use crate::error::{LinkError, LinkResult};

/// Characters `encodeURIComponent` leaves untouched, everything else escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// As [`COMPONENT`], but `/` separates path segments.
const PATH: &AsciiSet = &COMPONENT.remove(b'/');

/// Percent-encode one URL path component.
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Percent-encode a literal that may itself span path segments.
pub(crate) fn encode_path(raw: &str) -> String {
    utf8_percent_encode(raw, PATH).to_string()
}

/// Round and clamp a host-supplied number into `min..=max`.
///
/// NaN maps to `min`.
pub(crate) fn clamp_round(value: f64, min: i32, max: i32) -> i32 {
    if value.is_nan() {
        return min;
    }
    (value.round() as i64).clamp(min as i64, max as i64) as i32
}

/// Interpret a sensor payload as a number.
pub fn as_number(value: &SensorValue) -> LinkResult<f64> {
    match value {
        SensorValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| LinkError::parse(value.to_string(), "number out of range")),
        SensorValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| LinkError::parse(s.clone(), "expected a number")),
        other => Err(LinkError::parse(other.to_string(), "expected a number")),
    }
}

/// Interpret a sensor payload as a boolean.
pub fn as_bool(value: &SensorValue) -> LinkResult<bool> {
    match value {
        SensorValue::Bool(b) => Ok(*b),
        SensorValue::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        SensorValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(LinkError::parse(s.clone(), "expected a boolean")),
        },
        other => Err(LinkError::parse(other.to_string(), "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn component_encoding_matches_encode_uri_component() {
        assert_eq!(encode_component("Hello, world!"), "Hello%2C%20world!");
        assert_eq!(encode_component("a/b"), "a%2Fb");
        assert_eq!(encode_component("it's (ok) ~*"), "it's%20(ok)%20~*");
        assert_eq!(encode_component("-5"), "-5");
    }

    #[test]
    fn path_encoding_keeps_separators() {
        assert_eq!(
            encode_path("Accelerometer m/s²"),
            "Accelerometer%20m/s%C2%B2"
        );
    }

    #[test]
    fn clamp_round_bounds_and_rounds() {
        assert_eq!(clamp_round(49.6, 0, 100), 50);
        assert_eq!(clamp_round(-150.0, -100, 100), -100);
        assert_eq!(clamp_round(1e12, 0, 0xFFFF), 0xFFFF);
        assert_eq!(clamp_round(f64::NAN, 0, 100), 0);
    }

    #[test]
    fn numeric_payloads() {
        assert_eq!(as_number(&json!(21.5)).unwrap(), 21.5);
        assert_eq!(as_number(&json!("7")).unwrap(), 7.0);
        assert!(as_number(&json!([1, 2])).is_err());
    }

    #[test]
    fn boolean_payloads() {
        assert!(as_bool(&json!(true)).unwrap());
        assert!(!as_bool(&json!(0)).unwrap());
        assert!(as_bool(&json!("True")).unwrap());
        assert!(as_bool(&json!("maybe")).is_err());
    }
}
