// ── Thermoregulation view ──
//
// Zone records carry temperatures in tenths of a degree. The HVAC mode and
// action exposed to callers are derived from mode, season, dehumidifier and
// the zone's running status.

use etidomo_api::RawRecord;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::fields;

/// Zone operating mode (`mode` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThermoMode {
    Off,
    Manual,
    Auto,
    Jolly,
}

impl ThermoMode {
    pub fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Manual => 1,
            Self::Auto => 2,
            Self::Jolly => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Manual),
            2 => Some(Self::Auto),
            3 => Some(Self::Jolly),
            _ => None,
        }
    }
}

/// Plant season (`season` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Season {
    PlantOff,
    Winter,
    Summer,
}

/// Fan-coil speed as exposed to callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
}

impl FanMode {
    /// Protocol speed. Off (`0`) is reported as auto and never sent.
    pub fn speed(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Auto => 4,
        }
    }

    pub fn from_speed(speed: i64) -> Self {
        match speed {
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            _ => Self::Auto,
        }
    }
}

/// Requested climate mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Off,
    Auto,
    Heat,
    Cool,
    Dry,
}

/// What the zone is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    Off,
    Heating,
    Cooling,
    Idle,
}

/// Zone settings to send with `thermo_zone_config_req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSettings {
    pub mode: ThermoMode,
    pub season: Option<Season>,
}

impl HvacMode {
    /// Zone settings that select this mode. Dry has no direct setting.
    pub fn zone_settings(self) -> Option<ZoneSettings> {
        match self {
            Self::Off => Some(ZoneSettings {
                mode: ThermoMode::Off,
                season: None,
            }),
            Self::Auto => Some(ZoneSettings {
                mode: ThermoMode::Auto,
                season: None,
            }),
            Self::Heat => Some(ZoneSettings {
                mode: ThermoMode::Manual,
                season: Some(Season::Winter),
            }),
            Self::Cool => Some(ZoneSettings {
                mode: ThermoMode::Manual,
                season: Some(Season::Summer),
            }),
            Self::Dry => None,
        }
    }
}

/// Read-only view over a thermoregulation zone record.
#[derive(Debug, Clone, Copy)]
pub struct ThermoView<'a> {
    record: &'a RawRecord,
}

impl<'a> ThermoView<'a> {
    pub(crate) fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    pub fn mode(&self) -> Option<ThermoMode> {
        self.mode_code().and_then(ThermoMode::from_code)
    }

    pub fn mode_code(&self) -> Option<i64> {
        fields::int(self.record, "mode")
    }

    pub fn season(&self) -> Option<Season> {
        fields::string(self.record, "season").and_then(|s| s.parse().ok())
    }

    /// Zone running status (`status == 1` while heating or cooling).
    pub fn is_running(&self) -> bool {
        fields::int(self.record, "status") == Some(1)
    }

    /// Measured temperature in °C, from `temp` or `temp_dec`.
    pub fn current_temperature(&self) -> Option<f64> {
        fields::float(self.record, "temp")
            .or_else(|| fields::float(self.record, "temp_dec"))
            .map(|t| t / 10.0)
    }

    /// Target temperature in °C.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn target_temperature(&self) -> Option<f64> {
        self.set_point_raw().map(|t| t as f64 / 10.0)
    }

    /// Target temperature in tenths, as the controller stores it.
    pub fn set_point_raw(&self) -> Option<i64> {
        fields::int(self.record, "set_point")
    }

    pub fn dehumidifier_enabled(&self) -> bool {
        fields::object(self.record, "dehumidifier")
            .and_then(|d| fields::int(d, "enabled"))
            == Some(1)
    }

    pub fn target_humidity(&self) -> Option<i64> {
        fields::object(self.record, "dehumidifier").and_then(|d| fields::int(d, "setpoint"))
    }

    pub fn fan_speed(&self) -> Option<i64> {
        fields::int(self.record, "fan_speed")
    }

    /// Zones with a fan speed are fan coils.
    pub fn is_fancoil(&self) -> bool {
        self.fan_speed().is_some()
    }

    pub fn fan_mode(&self) -> Option<FanMode> {
        self.fan_speed().map(FanMode::from_speed)
    }

    pub fn hvac_mode(&self) -> HvacMode {
        match self.mode() {
            Some(ThermoMode::Off) => HvacMode::Off,
            Some(ThermoMode::Auto | ThermoMode::Jolly) => HvacMode::Auto,
            _ if self.dehumidifier_enabled() => HvacMode::Dry,
            _ => match self.season() {
                Some(Season::Winter) => HvacMode::Heat,
                Some(Season::Summer) => HvacMode::Cool,
                Some(Season::PlantOff) | None => HvacMode::Off,
            },
        }
    }

    /// Modes this zone accepts; dry only with a dehumidifier.
    pub fn hvac_modes(&self) -> Vec<HvacMode> {
        let mut modes = vec![HvacMode::Off, HvacMode::Auto, HvacMode::Heat, HvacMode::Cool];
        if self.target_humidity().is_some() {
            modes.push(HvacMode::Dry);
        }
        modes
    }

    pub fn hvac_action(&self) -> HvacAction {
        if self.mode() == Some(ThermoMode::Off) {
            return HvacAction::Off;
        }
        if !self.is_running() {
            return HvacAction::Idle;
        }
        match self.season() {
            Some(Season::Summer) => HvacAction::Cooling,
            _ => HvacAction::Heating,
        }
    }

    pub fn summary(&self) -> String {
        let fmt_temp = |t: Option<f64>| t.map_or_else(|| "-".to_owned(), |t| format!("{t:.1}°C"));
        let mut out = format!(
            "{} {} → {}",
            self.hvac_mode(),
            fmt_temp(self.current_temperature()),
            fmt_temp(self.target_temperature()),
        );
        if let Some(fan) = self.fan_mode() {
            out.push_str(&format!(" fan {fan}"));
        }
        out
    }
}

/// Convert a °C target into the controller's tenths, rounding to the
/// nearest tenth.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn set_point_tenths(celsius: f64) -> i64 {
    (celsius * 10.0).round() as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn temperatures_are_tenths() {
        let rec = record(json!({"temp": 215, "set_point": 200, "mode": 1, "season": "winter"}));
        let zone = ThermoView::new(&rec);
        assert_eq!(zone.current_temperature(), Some(21.5));
        assert_eq!(zone.target_temperature(), Some(20.0));
        assert_eq!(zone.hvac_mode(), HvacMode::Heat);
    }

    #[test]
    fn temp_dec_is_a_fallback() {
        let rec = record(json!({"temp_dec": 198}));
        assert_eq!(ThermoView::new(&rec).current_temperature(), Some(19.8));
    }

    #[test]
    fn auto_and_jolly_are_auto() {
        for mode in [2, 3] {
            let rec = record(json!({"mode": mode, "season": "summer"}));
            assert_eq!(ThermoView::new(&rec).hvac_mode(), HvacMode::Auto);
        }
    }

    #[test]
    fn manual_with_dehumidifier_is_dry() {
        let rec = record(json!({
            "mode": 1,
            "season": "summer",
            "dehumidifier": {"enabled": 1, "setpoint": 55}
        }));
        let zone = ThermoView::new(&rec);
        assert_eq!(zone.hvac_mode(), HvacMode::Dry);
        assert_eq!(zone.target_humidity(), Some(55));
        assert!(zone.hvac_modes().contains(&HvacMode::Dry));
    }

    #[test]
    fn hvac_action_follows_status_and_season() {
        let off = record(json!({"mode": 0, "status": 1, "season": "winter"}));
        assert_eq!(ThermoView::new(&off).hvac_action(), HvacAction::Off);

        let idle = record(json!({"mode": 1, "status": 0, "season": "winter"}));
        assert_eq!(ThermoView::new(&idle).hvac_action(), HvacAction::Idle);

        let cooling = record(json!({"mode": 2, "status": 1, "season": "summer"}));
        assert_eq!(ThermoView::new(&cooling).hvac_action(), HvacAction::Cooling);

        let heating = record(json!({"mode": 2, "status": 1, "season": "plant_off"}));
        assert_eq!(ThermoView::new(&heating).hvac_action(), HvacAction::Heating);
    }

    #[test]
    fn fan_speed_mapping() {
        assert_eq!(FanMode::from_speed(0), FanMode::Auto);
        assert_eq!(FanMode::from_speed(3), FanMode::High);
        assert_eq!(FanMode::Medium.speed(), 2);
        assert_eq!("HIGH".parse::<FanMode>().unwrap(), FanMode::High);
    }

    #[test]
    fn heat_selects_manual_winter() {
        let settings = HvacMode::Heat.zone_settings().unwrap();
        assert_eq!(settings.mode, ThermoMode::Manual);
        assert_eq!(settings.season, Some(Season::Winter));
        assert!(HvacMode::Dry.zone_settings().is_none());
    }

    #[test]
    fn set_point_rounds() {
        assert_eq!(set_point_tenths(21.5), 215);
        assert_eq!(set_point_tenths(20.04), 200);
        assert_eq!(set_point_tenths(19.96), 200);
    }
}
