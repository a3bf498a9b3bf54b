//! Thermoregulation command handlers.

use std::sync::Arc;

use etidomo_core::{
    Command as CoreCommand, Controller, Device, DeviceKind, FanMode, HvacAction, HvacMode, Season,
};
use tabled::Tabled;

use crate::cli::{ClimateArgs, ClimateCommand, FanModeArg, GlobalOpts, HvacModeArg, SeasonArg};
use crate::error::CliError;
use crate::output;

use super::util;

/// Set point range offered to users.
const MIN_SET_POINT: f64 = 7.0;
const MAX_SET_POINT: f64 = 35.0;

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Fan")]
    fan: String,
}

fn row(d: &Arc<Device>, color: bool) -> ZoneRow {
    let temp = |t: Option<f64>| t.map_or_else(|| "-".into(), |t| format!("{t:.1}°C"));
    match d.thermo() {
        Some(z) => {
            let action = z.hvac_action();
            let active = matches!(action, HvacAction::Heating | HvacAction::Cooling);
            ZoneRow {
                entity: d.entity_id.to_string(),
                name: d.name.clone(),
                mode: z.hvac_mode().to_string(),
                action: output::paint_state(&action.to_string(), active, color),
                current: temp(z.current_temperature()),
                target: temp(z.target_temperature()),
                fan: util::or_dash(z.fan_mode()),
            }
        }
        None => ZoneRow {
            entity: d.entity_id.to_string(),
            name: d.name.clone(),
            mode: "-".into(),
            action: "-".into(),
            current: "-".into(),
            target: "-".into(),
            fan: "-".into(),
        },
    }
}

fn hvac_mode(arg: HvacModeArg) -> HvacMode {
    match arg {
        HvacModeArg::Off => HvacMode::Off,
        HvacModeArg::Auto => HvacMode::Auto,
        HvacModeArg::Heat => HvacMode::Heat,
        HvacModeArg::Cool => HvacMode::Cool,
    }
}

fn fan_mode(arg: FanModeArg) -> FanMode {
    match arg {
        FanModeArg::Auto => FanMode::Auto,
        FanModeArg::Low => FanMode::Low,
        FanModeArg::Medium => FanMode::Medium,
        FanModeArg::High => FanMode::High,
    }
}

fn season_of(arg: SeasonArg) -> Season {
    match arg {
        SeasonArg::PlantOff => Season::PlantOff,
        SeasonArg::Winter => Season::Winter,
        SeasonArg::Summer => Season::Summer,
    }
}

fn check_set_point(celsius: f64) -> Result<(), CliError> {
    if (MIN_SET_POINT..=MAX_SET_POINT).contains(&celsius) {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "celsius".into(),
            reason: format!("{celsius} is outside {MIN_SET_POINT}-{MAX_SET_POINT}°C"),
        })
    }
}

pub async fn handle(
    controller: &Controller,
    args: ClimateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ClimateCommand::List => {
            let color = output::should_color(&global.color);
            let zones = controller.store().devices_of_kind(DeviceKind::Thermostat);
            let out = output::render_list(
                &global.output,
                &zones,
                |d| row(d, color),
                |d| d.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ClimateCommand::SetTemp { target, celsius } => {
            check_set_point(celsius)?;
            let id = util::resolve_device(controller, &target, DeviceKind::Thermostat)?;
            let done = format!("{id} target set to {celsius:.1}°C");
            let cmd = CoreCommand::SetTemperature { id, celsius };
            util::execute(controller, cmd, &done, global).await
        }

        ClimateCommand::SetMode { target, mode } => {
            let id = util::resolve_device(controller, &target, DeviceKind::Thermostat)?;
            let mode = hvac_mode(mode);
            let done = format!("{id} mode set to {mode}");
            util::execute(controller, CoreCommand::SetHvacMode { id, mode }, &done, global).await
        }

        ClimateCommand::SetFan { target, mode } => {
            let id = util::resolve_device(controller, &target, DeviceKind::Thermostat)?;
            let mode = fan_mode(mode);
            let done = format!("{id} fan set to {mode}");
            util::execute(controller, CoreCommand::SetFanMode { id, mode }, &done, global).await
        }

        ClimateCommand::SetSeason { target, season: arg } => {
            let id = util::resolve_device(controller, &target, DeviceKind::Thermostat)?;
            let season = season_of(arg);
            let done = format!("season set to {season}");
            util::execute(controller, CoreCommand::SetSeason { id, season }, &done, global).await
        }
    }
}
