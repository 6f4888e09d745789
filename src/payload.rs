//! ==============================================================================
//! payload.rs - wire shapes and response normalization
//! ==============================================================================
//!
//! purpose:
//!     turns backend json into a validated snapshot (series + emergency state).
//!     malformed samples never reach the caller: each one is replaced by the
//!     last valid sample before it, or by DEFAULT_READING when there is none.
//!
//! wire shapes:
//!     history / serial:  {bs_temp:[..], bs_hum:[..], bs_feel:[..], bs_mq135:[..],
//!                         bs_gas_adc:[..]?, bs_fire: bool, bs_gas: bool}
//!     live:              {message: {<id>: {temperature, ...}, ...,
//!                                   fire_node: bool, gas_node: bool}}
//!
//! relationships:
//!     - used by: source.rs (client side decoding)
//!     - used by: backend (builds the same shapes when serving)
//!
//! ==============================================================================

use crate::domain::{number_of, EmergencyState, Reading, ReadingCheck, Series, DEFAULT_READING};
use crate::error::PayloadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// node keys that carry alarm flags instead of samples
pub const FIRE_NODE: &str = "fire_node";
pub const GAS_NODE: &str = "gas_node";

/// one decoded response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub series: Series,
    pub emergency: EmergencyState,
    /// how many samples were gap-filled
    pub substituted: usize,
}

// ==============================================================================
// wire shapes
// ==============================================================================

/// parallel-array payload of /get_init_data and /get_serial_data
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkPayload {
    #[serde(default)]
    pub bs_temp: Vec<Value>,
    #[serde(default)]
    pub bs_hum: Vec<Value>,
    #[serde(default)]
    pub bs_feel: Vec<Value>,
    #[serde(default)]
    pub bs_mq135: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bs_gas_adc: Option<Vec<Value>>,
    #[serde(default)]
    pub bs_fire: bool,
    #[serde(default)]
    pub bs_gas: bool,
}

/// 200 body of /get_live_data
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveEnvelope {
    #[serde(default)]
    pub message: Value,
}

/// error body of 403 / 429 / 500 responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// body of /login responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginReply {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

// ==============================================================================
// gap-fill
// ==============================================================================

/// replace invalid samples with the last valid one (or the default)
/// returns the filled readings and how many were substituted
pub fn gap_fill<I>(checks: I) -> (Vec<Reading>, usize)
where
    I: IntoIterator<Item = ReadingCheck>,
{
    let mut last_valid: Option<Reading> = None;
    let mut substituted = 0;
    let mut out = Vec::new();

    for (index, check) in checks.into_iter().enumerate() {
        match check {
            ReadingCheck::Valid(reading) => {
                last_valid = Some(reading);
                out.push(reading);
            }
            ReadingCheck::Invalid { missing } => {
                tracing::debug!(index, ?missing, "invalid sample, gap-filling");
                substituted += 1;
                out.push(last_valid.unwrap_or(DEFAULT_READING));
            }
        }
    }

    (out, substituted)
}

// ==============================================================================
// decoding
// ==============================================================================

impl BulkPayload {
    /// validate the parallel arrays and bound the result to `limit` points
    pub fn into_snapshot(self, limit: Option<usize>) -> Result<Snapshot, PayloadError> {
        let len = self.bs_temp.len();
        let gas_len = self.bs_gas_adc.as_ref().map(|v| v.len()).unwrap_or(len);
        let lengths = [self.bs_hum.len(), self.bs_feel.len(), self.bs_mq135.len(), gas_len];
        if lengths.iter().any(|l| *l != len) {
            return Err(PayloadError::LengthMismatch(format!(
                "temp={} hum={} feel={} mq135={} gas_adc={}",
                len, lengths[0], lengths[1], lengths[2], lengths[3]
            )));
        }
        if len == 0 {
            return Err(PayloadError::Empty);
        }

        let checks = (0..len).map(|i| {
            let gas = match &self.bs_gas_adc {
                Some(col) => number_of(&col[i]),
                None => Some(DEFAULT_READING.gas_adc),
            };
            Reading::check_channels([
                number_of(&self.bs_temp[i]),
                number_of(&self.bs_hum[i]),
                number_of(&self.bs_feel[i]),
                number_of(&self.bs_mq135[i]),
                gas,
            ])
        });
        let (readings, substituted) = gap_fill(checks);

        Ok(Snapshot {
            series: Series::bounded(readings, limit.map(|l| l.max(1))),
            emergency: EmergencyState::new(self.bs_fire, self.bs_gas),
            substituted,
        })
    }

    /// build the wire shape from clean readings (backend side)
    pub fn from_readings(readings: &[Reading], emergency: EmergencyState) -> Self {
        let col = |f: fn(&Reading) -> f64| -> Vec<Value> {
            readings.iter().map(|r| Value::from(f(r))).collect()
        };
        Self {
            bs_temp: col(|r| r.temperature),
            bs_hum: col(|r| r.humidity),
            bs_feel: col(|r| r.feels_like),
            bs_mq135: col(|r| r.air_quality),
            bs_gas_adc: Some(col(|r| r.gas_adc)),
            bs_fire: emergency.fire_detected,
            bs_gas: emergency.gas_detected,
        }
    }
}

/// decode a live node map: reserved keys feed the emergency state, every
/// other entry is a sample in insertion order
pub fn decode_live_node(node: &Value) -> Result<Snapshot, PayloadError> {
    let map = match node {
        Value::Null => return Err(PayloadError::Empty),
        Value::Object(map) => map,
        _ => return Err(PayloadError::NotAnObject),
    };

    let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
    let emergency = EmergencyState::new(flag(FIRE_NODE), flag(GAS_NODE));

    let checks = map
        .iter()
        .filter(|(key, _)| key.as_str() != FIRE_NODE && key.as_str() != GAS_NODE)
        .map(|(_, sample)| Reading::check_value(sample));
    let (readings, substituted) = gap_fill(checks);

    if readings.is_empty() {
        return Err(PayloadError::Empty);
    }

    Ok(Snapshot {
        series: Series::bounded(readings, None),
        emergency,
        substituted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Channel;
    use serde_json::json;

    fn sample(t: f64) -> Value {
        json!({"temperature": t, "humidity": 50, "feels_like": t + 1.0, "air_quality": 120, "gas_adc": 150})
    }

    #[test]
    fn test_gap_fill_uses_previous_valid() {
        let node = json!({
            "-a": sample(20.0),
            "-b": {"temperature": "oops"},
            "-c": sample(22.0),
        });
        let snap = decode_live_node(&node).unwrap();
        assert_eq!(snap.substituted, 1);
        assert_eq!(snap.series.readings()[1], snap.series.readings()[0]);
        assert_eq!(snap.series.column(Channel::Temperature), vec![20.0, 20.0, 22.0]);
    }

    #[test]
    fn test_gap_fill_at_start_uses_default() {
        let node = json!({
            "-a": {"humidity": 10},
            "-b": sample(21.0),
        });
        let snap = decode_live_node(&node).unwrap();
        assert_eq!(snap.series.readings()[0], DEFAULT_READING);
        assert_eq!(
            DEFAULT_READING.channels(),
            [33.0, 67.0, 36.0, 130.0, 153.0]
        );
    }

    #[test]
    fn test_gap_fill_prefers_nearest_valid_after_run_of_invalid() {
        let node = json!({
            "1": sample(20.0),
            "2": sample(25.0),
            "3": null,
            "4": {},
            "5": sample(30.0),
        });
        let snap = decode_live_node(&node).unwrap();
        assert_eq!(snap.substituted, 2);
        assert_eq!(snap.series.column(Channel::Temperature), vec![20.0, 25.0, 25.0, 25.0, 30.0]);
    }

    #[test]
    fn test_reserved_keys_only_feed_emergency() {
        let node = json!({
            "fire_node": true,
            "-a": sample(20.0),
            "gas_node": false,
            "-b": sample(21.0),
        });
        let snap = decode_live_node(&node).unwrap();
        assert_eq!(snap.series.len(), 2);
        assert_eq!(snap.substituted, 0);
        assert_eq!(snap.emergency, EmergencyState::new(true, false));
    }

    #[test]
    fn test_live_keys_keep_insertion_order() {
        let node = json!({"z": sample(1.0), "a": sample(2.0), "m": sample(3.0)});
        let snap = decode_live_node(&node).unwrap();
        assert_eq!(snap.series.column(Channel::Temperature), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_live_node_shape_errors() {
        assert_eq!(decode_live_node(&Value::Null), Err(PayloadError::Empty));
        assert_eq!(decode_live_node(&json!([1, 2])), Err(PayloadError::NotAnObject));
        assert_eq!(
            decode_live_node(&json!({"fire_node": true, "gas_node": true})),
            Err(PayloadError::Empty)
        );
    }

    #[test]
    fn test_bulk_payload_all_valid() {
        let payload: BulkPayload = serde_json::from_value(json!({
            "bs_temp": [20.0, 21.0, 22.0],
            "bs_hum": [40, 41, 42],
            "bs_feel": [21.0, 22.0, 23.0],
            "bs_mq135": [100, 110, 120],
            "bs_fire": false,
            "bs_gas": true
        }))
        .unwrap();
        let snap = payload.into_snapshot(Some(3)).unwrap();
        assert_eq!(snap.series.len(), 3);
        assert_eq!(snap.substituted, 0);
        assert_eq!(snap.emergency, EmergencyState::new(false, true));
        assert_eq!(snap.series.column(Channel::GasAdc), vec![153.0; 3]);
    }

    #[test]
    fn test_zero_bound_never_empties_a_payload() {
        let payload: BulkPayload = serde_json::from_value(json!({
            "bs_temp": [20.0, 21.0],
            "bs_hum": [40, 41],
            "bs_feel": [21.0, 22.0],
            "bs_mq135": [100, 110],
            "bs_gas_adc": [150, 151]
        }))
        .unwrap();
        let snap = payload.into_snapshot(Some(0)).unwrap();
        assert_eq!(snap.series.len(), 1);
        assert_eq!(snap.series.latest().map(|r| r.temperature), Some(21.0));
    }

    #[test]
    fn test_bulk_payload_gap_fills_and_bounds() {
        let payload: BulkPayload = serde_json::from_value(json!({
            "bs_temp": [20.0, null, 22.0, 23.0],
            "bs_hum": [40, 41, 42, 43],
            "bs_feel": [21.0, 22.0, 23.0, 24.0],
            "bs_mq135": [100, 110, 120, 130],
            "bs_gas_adc": [150, 151, 152, 153]
        }))
        .unwrap();
        let snap = payload.into_snapshot(Some(3)).unwrap();
        assert_eq!(snap.substituted, 1);
        // index 1 became a copy of index 0, then the oldest point fell off
        assert_eq!(snap.series.column(Channel::Temperature), vec![20.0, 22.0, 23.0]);
        assert_eq!(snap.series.column(Channel::Humidity), vec![40.0, 42.0, 43.0]);
    }

    #[test]
    fn test_bulk_payload_length_mismatch() {
        let payload: BulkPayload = serde_json::from_value(json!({
            "bs_temp": [20.0, 21.0],
            "bs_hum": [40],
            "bs_feel": [21.0, 22.0],
            "bs_mq135": [100, 110]
        }))
        .unwrap();
        assert!(matches!(
            payload.into_snapshot(None),
            Err(PayloadError::LengthMismatch(_))
        ));
    }

    #[test]
    fn test_from_readings_round_trips_through_snapshot() {
        let readings = vec![DEFAULT_READING, Reading { temperature: 40.0, ..DEFAULT_READING }];
        let payload = BulkPayload::from_readings(&readings, EmergencyState::new(true, true));
        let snap = payload.into_snapshot(None).unwrap();
        assert_eq!(snap.series.readings(), readings.as_slice());
        assert!(snap.emergency.is_emergency());
    }
}
