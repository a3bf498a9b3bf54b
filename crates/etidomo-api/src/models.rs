// Wire types for the ETI/Domo protocol.
//
// Device records vary wildly between features (and between firmware
// releases), so they stay as raw JSON maps here. `etidomo-core` lifts them
// into typed views. Only the fixed-shape replies get dedicated structs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single untyped record from the controller.
pub type RawRecord = serde_json::Map<String, Value>;

/// Session-layer reply. Application payload fields sit next to the
/// `sl_*` fields at the top level, so everything else is kept in `payload`.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionReply {
    #[serde(default)]
    pub sl_cmd: Option<String>,
    #[serde(default)]
    pub sl_data_ack_reason: Option<i64>,
    #[serde(flatten)]
    pub payload: RawRecord,
}

/// Payload of `sl_registration_ack`.
#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationAck {
    #[serde(default, deserialize_with = "lenient_string")]
    pub sl_client_id: Option<String>,
    #[serde(default)]
    pub sl_keep_alive_timeout_sec: Option<u64>,
}

/// `feature_list_resp`: controller identity plus the enabled features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureList {
    #[serde(default, deserialize_with = "lenient_string")]
    pub swver: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub serial: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub keycode: Option<String>,
    #[serde(default)]
    pub list: Vec<String>,
}

impl FeatureList {
    /// The advertised features, parsed.
    pub fn features(&self) -> Vec<Feature> {
        self.list.iter().map(|name| Feature::parse(name)).collect()
    }
}

/// `floor_list` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFloor {
    pub floor_ind: i64,
    #[serde(default)]
    pub name: String,
}

/// `room_list` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRoom {
    pub room_ind: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub floor_ind: Option<i64>,
}

/// Reply of a `{stem}_list_req`.
///
/// The thermoregulation reply also carries the plant-wide analog sensors
/// as top-level objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceListing {
    #[serde(default)]
    pub array: Vec<RawRecord>,
    #[serde(default)]
    pub temperature: Option<RawRecord>,
    #[serde(default)]
    pub humidity: Option<RawRecord>,
    #[serde(default)]
    pub pressure: Option<RawRecord>,
}

impl DeviceListing {
    /// Analog sensor objects present in this listing, tagged with their kind.
    pub fn analog_sensors(&self) -> Vec<(&'static str, &RawRecord)> {
        [
            ("temperature", self.temperature.as_ref()),
            ("humidity", self.humidity.as_ref()),
            ("pressure", self.pressure.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, record)| record.map(|r| (kind, r)))
        .collect()
    }
}

/// A controller feature, as named in `feature_list_resp.list`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Feature {
    Lights,
    Openings,
    Relays,
    Thermoregulation,
    Energy,
    DigitalIn,
    Scenarios,
    Other(String),
}

impl Feature {
    /// Every feature with a device listing, in discovery order.
    pub const LISTABLE: [Self; 6] = [
        Self::Lights,
        Self::Openings,
        Self::Relays,
        Self::Thermoregulation,
        Self::Energy,
        Self::DigitalIn,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "lights" => Self::Lights,
            "openings" => Self::Openings,
            "relays" => Self::Relays,
            "thermoregulation" => Self::Thermoregulation,
            "energy" => Self::Energy,
            "digitalin" => Self::DigitalIn,
            "scenarios" => Self::Scenarios,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Lights => "lights",
            Self::Openings => "openings",
            Self::Relays => "relays",
            Self::Thermoregulation => "thermoregulation",
            Self::Energy => "energy",
            Self::DigitalIn => "digitalin",
            Self::Scenarios => "scenarios",
            Self::Other(name) => name,
        }
    }

    /// Stem of the `{stem}_list_req` / `{stem}_list_resp` command pair.
    ///
    /// `None` for scenarios (their own command set) and unknown features.
    pub fn list_stem(&self) -> Option<&'static str> {
        match self {
            Self::Lights => Some("light"),
            Self::Openings => Some("openings"),
            Self::Relays => Some("relays"),
            Self::Thermoregulation => Some("thermo"),
            Self::Energy => Some("meters"),
            Self::DigitalIn => Some("digitalin"),
            Self::Scenarios | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept either a JSON string or number where the protocol is sloppy
/// about which one it sends.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_list_accepts_numeric_identity_fields() {
        let list: FeatureList = serde_json::from_value(json!({
            "swver": "1.2.3",
            "serial": 12_345_678,
            "list": ["lights", "energy", "sprinklers"]
        }))
        .unwrap();

        assert_eq!(list.serial.as_deref(), Some("12345678"));
        assert_eq!(
            list.features(),
            vec![
                Feature::Lights,
                Feature::Energy,
                Feature::Other("sprinklers".into())
            ]
        );
    }

    #[test]
    fn thermo_listing_exposes_analog_sensors() {
        let listing: DeviceListing = serde_json::from_value(json!({
            "array": [{"act_id": 1, "name": "Zona giorno"}],
            "temperature": {"value": 21.5, "unit": "C"},
            "pressure": {"value": 1013, "unit": "hPa"}
        }))
        .unwrap();

        let kinds: Vec<_> = listing.analog_sensors().iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["temperature", "pressure"]);
        assert_eq!(listing.array.len(), 1);
    }

    #[test]
    fn list_stems_follow_protocol_names() {
        assert_eq!(Feature::Lights.list_stem(), Some("light"));
        assert_eq!(Feature::Energy.list_stem(), Some("meters"));
        assert_eq!(Feature::Scenarios.list_stem(), None);
    }
}
