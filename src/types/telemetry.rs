//! Telemetry line format sent by remote sensor nodes.
//!
//! Remote nodes report readings as a comma separated list of `key=value`
//! pairs, e.g. `id=03,r=120,v=1.200`: node id, rain gauge pulses and battery
//! voltage. The relay forwards the line unchanged to the downstream sink,
//! which republishes it under [`TELEMETRY_TOPIC`].

use std::fmt;
use std::str::FromStr;

use crate::types::NodeId;

/// MQTT topic the downstream bridge publishes telemetry under.
pub const TELEMETRY_TOPIC: &str = "v1/devices/me/telemetry";

/// Key carrying the reporting node's id.
pub const KEY_NODE_ID: &str = "id";

/// Key carrying the battery voltage.
pub const KEY_BATTERY_VOLTS: &str = "v";

/// Key carrying the rain gauge pulse count.
pub const KEY_RAIN_PULSES: &str = "r";

/// Errors parsing a telemetry line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    /// A field is not of the form `key=value`.
    #[error("malformed field: {0:?}")]
    MalformedField(String),

    /// A key has no name.
    #[error("empty key")]
    EmptyKey,

    /// The line is not valid UTF-8.
    #[error("telemetry is not valid UTF-8")]
    InvalidUtf8,
}

/// A single reading value.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    /// Whole number, e.g. a pulse count.
    Integer(i64),
    /// Decimal reading, e.g. a voltage. Keeps the original text for formatting.
    Decimal { value: f64, text: String },
    /// Anything else.
    Text(String),
}

impl TelemetryValue {
    fn parse(text: &str) -> Self {
        if let Ok(value) = text.parse::<i64>() {
            Self::Integer(value)
        } else if let Ok(value) = text.parse::<f64>() {
            Self::Decimal {
                value,
                text: text.to_owned(),
            }
        } else {
            Self::Text(text.to_owned())
        }
    }

    /// Returns the value as a float, if numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Decimal { value, .. } => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Decimal { text, .. } | Self::Text(text) => f.write_str(text),
        }
    }
}

/// An ordered set of readings from one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryReport {
    fields: Vec<(String, TelemetryValue)>,
}

impl TelemetryReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parses a report from a radio payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, TelemetryError> {
        std::str::from_utf8(payload)
            .map_err(|_| TelemetryError::InvalidUtf8)?
            .parse()
    }

    /// Appends a reading, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: TelemetryValue) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TelemetryValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the reporting node id, if present and in range.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self.get(KEY_NODE_ID)? {
            TelemetryValue::Integer(id) => NodeId::try_from(*id).ok(),
            _ => None,
        }
    }

    /// Returns the battery voltage, if present.
    #[must_use]
    pub fn battery_volts(&self) -> Option<f64> {
        self.get(KEY_BATTERY_VOLTS)?.as_f64()
    }

    /// Returns the rain gauge pulse count, if present.
    #[must_use]
    pub fn rain_pulses(&self) -> Option<i64> {
        match self.get(KEY_RAIN_PULSES)? {
            TelemetryValue::Integer(count) => Some(*count),
            _ => None,
        }
    }

    /// Iterates over readings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the report has no readings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromStr for TelemetryReport {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut report = Self::new();
        for field in s.trim().split(',').filter(|f| !f.trim().is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| TelemetryError::MalformedField(field.to_owned()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(TelemetryError::EmptyKey);
            }
            report.insert(key, TelemetryValue::parse(value.trim()));
        }
        Ok(report)
    }
}

impl fmt::Display for TelemetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
