// Device listing and actuation endpoints
//
// One `{stem}_list_req` per feature for discovery and state refresh, plus
// the four actuator commands (lights, openings, relays, thermo zones).

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::client::{DomoClient, GENERIC_REPLY};
use crate::error::Error;
use crate::models::{DeviceListing, Feature};

/// Movement requested from an opening (`opening_move_req.wanted_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningMove {
    Stop,
    Open,
    Close,
    SlatOpen,
    SlatClose,
}

impl OpeningMove {
    pub fn wanted_status(self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::Open => 1,
            Self::Close => 2,
            Self::SlatOpen => 3,
            Self::SlatClose => 4,
        }
    }
}

/// Parameters of `light_switch_req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightSwitch {
    pub act_id: i64,
    pub wanted_status: i64,
    /// Brightness in percent, for dimmers.
    pub perc: Option<u8>,
    /// Colour, for RGB lights.
    pub rgb: Option<[u8; 3]>,
}

/// Parameters of `thermo_zone_config_req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    pub act_id: i64,
    pub mode: i64,
    /// Target temperature in tenths of a degree.
    pub set_point: i64,
    pub season: Option<String>,
    pub fan_speed: Option<u8>,
}

impl DomoClient {
    /// List every device of `feature` on the plant.
    ///
    /// `{stem}_list_req` (scope `plant`) → `{stem}_list_resp`
    pub async fn list_devices(&self, feature: &Feature) -> Result<DeviceListing, Error> {
        let stem = listing_stem(feature)?;
        debug!(%feature, "listing devices");
        let listing: DeviceListing = self
            .request(
                json!({
                    "cmd_name": format!("{stem}_list_req"),
                    "topologic_scope": "plant",
                }),
                &format!("{stem}_list_resp"),
                None,
            )
            .await?;
        debug!(%feature, count = listing.array.len(), "devices listed");
        Ok(listing)
    }

    /// Read the current state of a single device.
    ///
    /// `{stem}_list_req` (scope `act`, value `act_id`) → `{stem}_list_resp`
    pub async fn device_state(&self, feature: &Feature, act_id: i64) -> Result<DeviceListing, Error> {
        let stem = listing_stem(feature)?;
        self.request(
            json!({
                "cmd_name": format!("{stem}_list_req"),
                "topologic_scope": "act",
                "value": act_id,
            }),
            &format!("{stem}_list_resp"),
            None,
        )
        .await
    }

    /// Switch a light, optionally setting brightness or colour.
    ///
    /// `light_switch_req` → `generic_reply`
    pub async fn switch_light(&self, switch: &LightSwitch) -> Result<(), Error> {
        let mut cmd = Map::new();
        cmd.insert("cmd_name".into(), "light_switch_req".into());
        cmd.insert("act_id".into(), switch.act_id.into());
        cmd.insert("wanted_status".into(), switch.wanted_status.into());
        if let Some(perc) = switch.perc {
            cmd.insert("perc".into(), perc.min(100).into());
        }
        if let Some(rgb) = switch.rgb {
            cmd.insert("rgb".into(), json!(rgb));
        }
        debug!(act_id = switch.act_id, status = switch.wanted_status, "switching light");
        self.generic(Value::Object(cmd)).await
    }

    /// Move an opening (shutter, gate, door).
    ///
    /// `opening_move_req` → `generic_reply`
    pub async fn move_opening(&self, act_id: i64, movement: OpeningMove) -> Result<(), Error> {
        debug!(act_id, ?movement, "moving opening");
        self.generic(json!({
            "cmd_name": "opening_move_req",
            "act_id": act_id,
            "wanted_status": movement.wanted_status(),
        }))
        .await
    }

    /// Switch a generic relay on or off.
    ///
    /// `relay_activation_req` → `generic_reply`
    pub async fn switch_relay(&self, act_id: i64, on: bool) -> Result<(), Error> {
        debug!(act_id, on, "switching relay");
        self.generic(json!({
            "cmd_name": "relay_activation_req",
            "act_id": act_id,
            "wanted_status": u8::from(on),
        }))
        .await
    }

    /// Reconfigure a thermoregulation zone.
    ///
    /// `thermo_zone_config_req` → `generic_reply`. Season and fan speed are
    /// extended fields and flip `extended_infos` on.
    pub async fn configure_zone(&self, config: &ZoneConfig) -> Result<(), Error> {
        let mut cmd = Map::new();
        cmd.insert("cmd_name".into(), "thermo_zone_config_req".into());
        cmd.insert("act_id".into(), config.act_id.into());
        cmd.insert("mode".into(), config.mode.into());
        cmd.insert("set_point".into(), config.set_point.into());

        let mut extended = false;
        if let Some(season) = &config.season {
            cmd.insert("season".into(), season.clone().into());
            extended = true;
        }
        if let Some(speed) = config.fan_speed {
            cmd.insert("fan_speed".into(), speed.into());
            extended = true;
        }
        cmd.insert("extended_infos".into(), u8::from(extended).into());

        debug!(
            act_id = config.act_id,
            mode = config.mode,
            set_point = config.set_point,
            "configuring thermo zone"
        );
        self.generic(Value::Object(cmd)).await
    }

    async fn generic(&self, command: Value) -> Result<(), Error> {
        self.application_request(command, Some(GENERIC_REPLY), None)
            .await
            .map(|_| ())
    }
}

fn listing_stem(feature: &Feature) -> Result<&'static str, Error> {
    feature
        .list_stem()
        .ok_or_else(|| Error::UnsupportedFeature(feature.to_string()))
}
