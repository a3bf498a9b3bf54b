// ── Device domain type ──
//
// A device is the raw controller record plus the identity derived from it.
// Typed views (`LightView`, `ThermoView`, ...) read from the record on
// demand, so a status update only has to overlay fields.

use etidomo_api::{Feature, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter};

use super::climate::ThermoView;
use super::cover::OpeningView;
use super::entity_id::{EntityId, Platform};
use super::fields;
use super::light::LightView;
use super::sensor::{AnalogSensorView, EnergyMeterView};

// ── DeviceKind ──────────────────────────────────────────────────────

/// Controller device type, by its protocol type id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[strum(serialize = "Energy sensor")]
    EnergySensor,
    #[strum(serialize = "Analog sensor")]
    AnalogSensor,
    #[strum(serialize = "Light")]
    Light,
    #[strum(serialize = "Opening")]
    Opening,
    #[strum(serialize = "Thermostat")]
    Thermostat,
    #[strum(serialize = "Scenario")]
    Scenario,
    #[strum(serialize = "Generic relay")]
    Relay,
    #[strum(serialize = "Digital input")]
    DigitalInput,
}

impl DeviceKind {
    pub fn type_id(self) -> i64 {
        match self {
            Self::EnergySensor => -2,
            Self::AnalogSensor => -1,
            Self::Light => 0,
            Self::Opening => 1,
            Self::Thermostat => 2,
            Self::Scenario => 4,
            Self::Relay => 11,
            Self::DigitalInput => 14,
        }
    }

    pub fn from_type_id(id: i64) -> Option<Self> {
        Some(match id {
            -2 => Self::EnergySensor,
            -1 => Self::AnalogSensor,
            0 => Self::Light,
            1 => Self::Opening,
            2 => Self::Thermostat,
            4 => Self::Scenario,
            11 => Self::Relay,
            14 => Self::DigitalInput,
            _ => return None,
        })
    }

    pub fn platform(self) -> Platform {
        match self {
            Self::EnergySensor | Self::AnalogSensor => Platform::Sensor,
            Self::Light => Platform::Light,
            Self::Opening => Platform::Cover,
            Self::Thermostat => Platform::Climate,
            Self::Scenario => Platform::Scene,
            Self::Relay => Platform::Switch,
            Self::DigitalInput => Platform::BinarySensor,
        }
    }

    /// Device kinds discovered from a feature's listing.
    ///
    /// Analog sensors ride along in the thermoregulation reply.
    pub fn for_feature(feature: &Feature) -> Option<Self> {
        match feature {
            Feature::Lights => Some(Self::Light),
            Feature::Openings => Some(Self::Opening),
            Feature::Relays => Some(Self::Relay),
            Feature::Thermoregulation => Some(Self::Thermostat),
            Feature::Energy => Some(Self::EnergySensor),
            Feature::DigitalIn => Some(Self::DigitalInput),
            Feature::Scenarios | Feature::Other(_) => None,
        }
    }

    /// Feature whose listing refreshes this kind.
    pub fn feature(self) -> Option<Feature> {
        match self {
            Self::Light => Some(Feature::Lights),
            Self::Opening => Some(Feature::Openings),
            Self::Relay => Some(Feature::Relays),
            Self::Thermostat | Self::AnalogSensor => Some(Feature::Thermoregulation),
            Self::EnergySensor => Some(Feature::Energy),
            Self::DigitalInput => Some(Feature::DigitalIn),
            Self::Scenario => Some(Feature::Scenarios),
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A controller device with its derived entity identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub entity_id: EntityId,
    pub kind: DeviceKind,
    pub act_id: Option<i64>,
    pub name: String,
    pub floor_id: Option<i64>,
    pub room_id: Option<i64>,
    pub device_class: Option<String>,
    /// Last known controller fields.
    pub record: RawRecord,
}

impl Device {
    /// Build a device from a listing record.
    pub fn from_record(kind: DeviceKind, record: RawRecord) -> Self {
        let act_id = match kind {
            DeviceKind::Opening => {
                fields::int(&record, "open_act_id").or_else(|| fields::int(&record, "act_id"))
            }
            _ => fields::int(&record, "act_id"),
        };
        let name = fields::string(&record, "name").unwrap_or_default();
        let device_class = match kind {
            DeviceKind::DigitalInput => None,
            _ => Some(kind.to_string().to_lowercase()),
        };

        Self {
            entity_id: EntityId::derive(kind.platform(), &name, act_id),
            kind,
            act_id,
            floor_id: fields::int(&record, "floor_ind"),
            room_id: fields::int(&record, "room_ind"),
            name,
            device_class,
            record,
        }
    }

    /// Build an analog sensor from the `temperature`/`humidity`/`pressure`
    /// object of a thermoregulation listing.
    ///
    /// Unnamed sensors are named after their measurement.
    pub fn analog(measurement: &str, mut record: RawRecord) -> Self {
        if fields::string(&record, "name").is_none_or(|n| n.trim().is_empty()) {
            record.insert("name".into(), Value::String(capitalize(measurement)));
        }
        let mut device = Self::from_record(DeviceKind::AnalogSensor, record);
        device.device_class = Some(measurement.to_owned());
        device
    }

    /// Overlay the fields of a status record onto this device.
    ///
    /// `cmd_name` is protocol framing and never stored. Returns `true` when
    /// at least one field changed.
    pub fn apply_update(&mut self, update: &RawRecord) -> bool {
        let mut changed = false;
        for (key, value) in update {
            if key == "cmd_name" {
                continue;
            }
            if self.record.get(key) != Some(value) {
                self.record.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Raw `status` field.
    pub fn status(&self) -> Option<i64> {
        fields::int(&self.record, "status")
    }

    /// On/off state for relays and digital inputs (`status == 1`).
    pub fn is_on(&self) -> bool {
        self.status() == Some(1)
    }

    pub fn light(&self) -> Option<LightView<'_>> {
        (self.kind == DeviceKind::Light).then(|| LightView::new(&self.record))
    }

    pub fn thermo(&self) -> Option<ThermoView<'_>> {
        (self.kind == DeviceKind::Thermostat).then(|| ThermoView::new(&self.record))
    }

    pub fn opening(&self) -> Option<OpeningView<'_>> {
        (self.kind == DeviceKind::Opening).then(|| OpeningView::new(&self.record))
    }

    pub fn analog_sensor(&self) -> Option<AnalogSensorView<'_>> {
        (self.kind == DeviceKind::AnalogSensor).then(|| AnalogSensorView::new(&self.record))
    }

    pub fn energy_meter(&self) -> Option<EnergyMeterView<'_>> {
        (self.kind == DeviceKind::EnergySensor).then(|| EnergyMeterView::new(&self.record))
    }

    /// One-line human summary of the current state.
    pub fn state_summary(&self) -> String {
        match self.kind {
            DeviceKind::Light => self.light().map_or_else(String::new, |l| l.summary()),
            DeviceKind::Opening => self.opening().map_or_else(String::new, |o| o.summary()),
            DeviceKind::Thermostat => self.thermo().map_or_else(String::new, |t| t.summary()),
            DeviceKind::AnalogSensor => {
                self.analog_sensor().map_or_else(String::new, |s| s.summary())
            }
            DeviceKind::EnergySensor => {
                self.energy_meter().map_or_else(String::new, |e| e.summary())
            }
            DeviceKind::Relay | DeviceKind::DigitalInput => {
                if self.is_on() { "on" } else { "off" }.to_owned()
            }
            DeviceKind::Scenario => String::new(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn light_record_maps_to_entity() {
        let dev = Device::from_record(
            DeviceKind::Light,
            record(json!({"act_id": 59, "name": "Cucina", "floor_ind": 1, "room_ind": 3, "status": 1})),
        );
        assert_eq!(dev.entity_id.to_string(), "light.cucina_59");
        assert_eq!(dev.floor_id, Some(1));
        assert_eq!(dev.room_id, Some(3));
        assert_eq!(dev.device_class.as_deref(), Some("light"));
        assert!(dev.is_on());
    }

    #[test]
    fn openings_use_open_act_id() {
        let dev = Device::from_record(
            DeviceKind::Opening,
            record(json!({"open_act_id": 12, "close_act_id": 13, "name": "Tapparella"})),
        );
        assert_eq!(dev.act_id, Some(12));
        assert_eq!(dev.entity_id.to_string(), "cover.tapparella_12");
    }

    #[test]
    fn unnamed_analog_sensor_falls_back_to_measurement() {
        let dev = Device::analog("humidity", record(json!({"value": 48, "unit": "%"})));
        assert_eq!(dev.name, "Humidity");
        assert_eq!(dev.entity_id.to_string(), "sensor.humidity_0");
        assert_eq!(dev.device_class.as_deref(), Some("humidity"));
    }

    #[test]
    fn apply_update_overlays_and_strips_cmd_name() {
        let mut dev = Device::from_record(
            DeviceKind::Relay,
            record(json!({"act_id": 3, "name": "Pompa", "status": 0})),
        );
        let changed = dev.apply_update(&record(json!({
            "cmd_name": "relay_switch_ind",
            "act_id": 3,
            "status": 1
        })));
        assert!(changed);
        assert!(dev.is_on());
        assert!(!dev.record.contains_key("cmd_name"));
        assert_eq!(dev.name, "Pompa");
    }

    #[test]
    fn apply_update_reports_no_change() {
        let mut dev = Device::from_record(
            DeviceKind::Relay,
            record(json!({"act_id": 3, "name": "Pompa", "status": 1})),
        );
        assert!(!dev.apply_update(&record(json!({"act_id": 3, "status": 1}))));
    }

    #[test]
    fn type_ids_round_trip() {
        use strum::IntoEnumIterator;
        for kind in DeviceKind::iter() {
            assert_eq!(DeviceKind::from_type_id(kind.type_id()), Some(kind));
        }
        assert_eq!(DeviceKind::from_type_id(12), None);
    }
}
