//! ==============================================================================
//! domain.rs - sensor readings, series and emergency state
//! ==============================================================================
//!
//! purpose:
//!     the vocabulary shared by the data source, the polling controller and
//!     the renderer. a reading is one sample of the five sensor channels; a
//!     series is the rolling window of readings that the charts draw.
//!
//! relationships:
//!     - used by: payload.rs (builds readings from json)
//!     - used by: controller.rs, render.rs (consume series + emergency state)
//!     - used by: backend/dataset.rs (rows are readings + fire/gas flags)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==============================================================================
// reading
// ==============================================================================

/// one sensor sample
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// feels-like temperature in celsius
    pub feels_like: f64,
    /// air quality (mq135, ppm)
    pub air_quality: f64,
    /// raw gas sensor adc value
    pub gas_adc: f64,
}

/// substituted for an invalid sample when no earlier valid sample exists
pub const DEFAULT_READING: Reading = Reading {
    temperature: 33.0,
    humidity: 67.0,
    feels_like: 36.0,
    air_quality: 130.0,
    gas_adc: 153.0,
};

/// json keys accepted for each channel of a live sample, first is canonical
const FIELD_ALIASES: [(&str, &[&str]); 5] = [
    ("temperature", &["temperature", "temp"]),
    ("humidity", &["humidity", "hum"]),
    ("feels_like", &["feels_like", "feelsLike", "feel"]),
    ("air_quality", &["air_quality", "airQuality", "mq135"]),
    ("gas_adc", &["gas_adc", "gasAdc", "gas"]),
];

/// outcome of validating one raw sample
#[derive(Clone, Debug, PartialEq)]
pub enum ReadingCheck {
    Valid(Reading),
    /// names the channels that were absent, non-numeric or NaN
    Invalid { missing: Vec<&'static str> },
}

impl ReadingCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, ReadingCheck::Valid(_))
    }
}

impl Reading {
    /// all five channels present and not NaN
    pub fn is_valid(&self) -> bool {
        self.channels().iter().all(|v| !v.is_nan())
    }

    pub fn channels(&self) -> [f64; 5] {
        [self.temperature, self.humidity, self.feels_like, self.air_quality, self.gas_adc]
    }

    /// validate five optional channel values in canonical order
    pub fn check_channels(values: [Option<f64>; 5]) -> ReadingCheck {
        let missing: Vec<&'static str> = values
            .iter()
            .zip(FIELD_ALIASES.iter())
            .filter(|(v, _)| !matches!(v, Some(x) if !x.is_nan()))
            .map(|(_, (name, _))| *name)
            .collect();

        if !missing.is_empty() {
            return ReadingCheck::Invalid { missing };
        }

        let [t, h, f, a, g] = values.map(|v| v.unwrap_or(f64::NAN));
        ReadingCheck::Valid(Reading {
            temperature: t,
            humidity: h,
            feels_like: f,
            air_quality: a,
            gas_adc: g,
        })
    }

    /// validate a json object sample (live node entries)
    pub fn check_value(value: &Value) -> ReadingCheck {
        let Some(obj) = value.as_object() else {
            return ReadingCheck::Invalid {
                missing: FIELD_ALIASES.iter().map(|(name, _)| *name).collect(),
            };
        };

        let values = FIELD_ALIASES.map(|(_, aliases)| {
            aliases
                .iter()
                .find_map(|key| obj.get(*key))
                .and_then(number_of)
        });
        Self::check_channels(values)
    }
}

/// json numbers only; strings like "25" or "NaN" do not count
pub fn number_of(value: &Value) -> Option<f64> {
    value.as_f64()
}

// ==============================================================================
// series
// ==============================================================================

/// chronological readings, bounded to a rolling window
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Series {
    readings: Vec<Reading>,
}

/// one channel of a series, used as chart id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Humidity,
    FeelsLike,
    AirQuality,
    GasAdc,
}

impl Channel {
    pub fn id(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::FeelsLike => "feels_like",
            Channel::AirQuality => "air_quality",
            Channel::GasAdc => "gas_adc",
        }
    }

    fn pick(&self, r: &Reading) -> f64 {
        match self {
            Channel::Temperature => r.temperature,
            Channel::Humidity => r.humidity,
            Channel::FeelsLike => r.feels_like,
            Channel::AirQuality => r.air_quality,
            Channel::GasAdc => r.gas_adc,
        }
    }
}

impl Series {
    /// keeps the newest `limit` readings when a limit is given
    pub fn bounded(mut readings: Vec<Reading>, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            if readings.len() > limit {
                readings.drain(..readings.len() - limit);
            }
        }
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn column(&self, channel: Channel) -> Vec<f64> {
        self.readings.iter().map(|r| channel.pick(r)).collect()
    }
}

// ==============================================================================
// emergency state
// ==============================================================================

/// fire/gas flags from the latest fetch, never persisted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmergencyState {
    pub fire_detected: bool,
    pub gas_detected: bool,
}

impl EmergencyState {
    pub fn new(fire_detected: bool, gas_detected: bool) -> Self {
        Self { fire_detected, gas_detected }
    }

    pub fn is_emergency(&self) -> bool {
        self.fire_detected || self.gas_detected
    }

    /// short title for notifications, None when all clear
    pub fn title(&self) -> Option<&'static str> {
        match (self.fire_detected, self.gas_detected) {
            (true, true) => Some("Fire and Gas Emergency!"),
            (true, false) => Some("Fire Emergency!"),
            (false, true) => Some("Gas Emergency!"),
            (false, false) => None,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match (self.fire_detected, self.gas_detected) {
            (true, true) => Some("Fire and harmful gases detected. Evacuate immediately!"),
            (true, false) => Some("Fire detected. Evacuate immediately!"),
            (false, true) => Some("Harmful gases detected. Evacuate immediately!"),
            (false, false) => None,
        }
    }
}

// ==============================================================================
// fetch mode
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    InitialHistory,
    SimulatedSerial,
    AuthenticatedLive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reading_validity_requires_all_channels_not_nan() {
        assert!(DEFAULT_READING.is_valid());

        let mut r = DEFAULT_READING;
        r.feels_like = f64::NAN;
        assert!(!r.is_valid());

        let mut r = DEFAULT_READING;
        r.gas_adc = f64::NAN;
        assert!(!r.is_valid());
    }

    #[test]
    fn test_check_value_accepts_aliases() {
        let sample = json!({"temp": 24.5, "hum": 40, "feelsLike": 25.1, "mq135": 110, "gasAdc": 140});
        let check = Reading::check_value(&sample);
        assert_eq!(
            check,
            ReadingCheck::Valid(Reading {
                temperature: 24.5,
                humidity: 40.0,
                feels_like: 25.1,
                air_quality: 110.0,
                gas_adc: 140.0,
            })
        );
    }

    #[test]
    fn test_check_value_names_missing_channels() {
        let sample = json!({"temperature": 24.5, "humidity": "40", "feels_like": 25.1, "air_quality": null});
        match Reading::check_value(&sample) {
            ReadingCheck::Invalid { missing } => {
                assert_eq!(missing, vec!["humidity", "air_quality", "gas_adc"]);
            }
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_check_value_rejects_non_objects() {
        assert!(!Reading::check_value(&json!(42)).is_valid());
        assert!(!Reading::check_value(&json!([1, 2, 3, 4, 5])).is_valid());
    }

    #[test]
    fn test_check_channels_rejects_nan() {
        let check = Reading::check_channels([Some(1.0), Some(f64::NAN), Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(check, ReadingCheck::Invalid { missing: vec!["humidity"] });
    }

    #[test]
    fn test_series_bounded_keeps_newest() {
        let readings: Vec<Reading> = (0..5)
            .map(|i| Reading { temperature: i as f64, ..DEFAULT_READING })
            .collect();
        let series = Series::bounded(readings, Some(3));
        assert_eq!(series.column(Channel::Temperature), vec![2.0, 3.0, 4.0]);
        assert_eq!(series.latest().map(|r| r.temperature), Some(4.0));
    }

    #[test]
    fn test_emergency_messages() {
        assert_eq!(EmergencyState::new(false, false).message(), None);
        assert_eq!(EmergencyState::new(true, false).title(), Some("Fire Emergency!"));
        assert_eq!(
            EmergencyState::new(true, true).message(),
            Some("Fire and harmful gases detected. Evacuate immediately!")
        );
        assert!(EmergencyState::new(false, true).is_emergency());
    }
}
