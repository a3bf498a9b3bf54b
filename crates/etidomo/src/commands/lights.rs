//! Light command handlers.

use std::sync::Arc;

use etidomo_core::{Command as CoreCommand, Controller, Device, DeviceKind};
use tabled::Tabled;

use crate::cli::{GlobalOpts, LightsArgs, LightsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LightRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    light_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Colour")]
    colour: String,
}

fn row(d: &Arc<Device>, color: bool) -> LightRow {
    let view = d.light();
    let state = view
        .and_then(|l| l.state())
        .map_or_else(|| "unknown".into(), |s| s.to_string());
    let on = view.is_some_and(|l| l.is_on());
    LightRow {
        entity: d.entity_id.to_string(),
        name: d.name.clone(),
        light_type: util::or_dash(view.and_then(|l| l.light_type())),
        state: output::paint_state(&state, on, color),
        brightness: view
            .filter(|l| l.supports_brightness())
            .map_or_else(|| "-".into(), |l| format!("{}%", l.brightness())),
        colour: view.filter(|l| l.supports_color()).map_or_else(
            || "-".into(),
            |l| {
                let [r, g, b] = l.rgb();
                format!("#{r:02x}{g:02x}{b:02x}")
            },
        ),
    }
}

/// Parse `R,G,B` with each channel in 0-255.
fn parse_rgb(raw: &str) -> Result<[u8; 3], CliError> {
    let invalid = |reason: &str| CliError::Validation {
        field: "rgb".into(),
        reason: reason.into(),
    };
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(invalid("expected three comma-separated values, e.g. 255,128,0"));
    };
    let channel = |v: &str| {
        v.parse::<u8>()
            .map_err(|_| invalid(&format!("'{v}' is not a value between 0 and 255")))
    };
    Ok([channel(r)?, channel(g)?, channel(b)?])
}

fn check_hs(hue: f64, saturation: f64) -> Result<(), CliError> {
    if !(0.0..=360.0).contains(&hue) {
        return Err(CliError::Validation {
            field: "hue".into(),
            reason: format!("{hue} is outside 0-360"),
        });
    }
    if !(0.0..=100.0).contains(&saturation) {
        return Err(CliError::Validation {
            field: "saturation".into(),
            reason: format!("{saturation} is outside 0-100"),
        });
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: LightsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LightsCommand::List => {
            let color = output::should_color(&global.color);
            let lights = controller.store().devices_of_kind(DeviceKind::Light);
            let out = output::render_list(
                &global.output,
                &lights,
                |d| row(d, color),
                |d| d.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LightsCommand::On(target) => {
            let id = util::resolve_device(controller, &target, DeviceKind::Light)?;
            let done = format!("{id} on");
            util::execute(controller, CoreCommand::LightOn { id }, &done, global).await
        }

        LightsCommand::Off(target) => {
            let id = util::resolve_device(controller, &target, DeviceKind::Light)?;
            let done = format!("{id} off");
            util::execute(controller, CoreCommand::LightOff { id }, &done, global).await
        }

        LightsCommand::Auto(target) => {
            let id = util::resolve_device(controller, &target, DeviceKind::Light)?;
            let done = format!("{id} handed back to automation");
            util::execute(controller, CoreCommand::LightAuto { id }, &done, global).await
        }

        LightsCommand::Brightness { target, percent } => {
            let id = util::resolve_device(controller, &target, DeviceKind::Light)?;
            let done = format!("{id} brightness set to {percent}%");
            let cmd = CoreCommand::LightBrightness {
                id,
                brightness: percent,
            };
            util::execute(controller, cmd, &done, global).await
        }

        LightsCommand::Color {
            target,
            rgb,
            hue,
            saturation,
        } => {
            let id = util::resolve_device(controller, &target, DeviceKind::Light)?;
            let cmd = match (rgb, hue, saturation) {
                (Some(raw), _, _) => CoreCommand::LightRgb {
                    id: id.clone(),
                    rgb: parse_rgb(&raw)?,
                },
                (None, Some(hue), Some(saturation)) => {
                    check_hs(hue, saturation)?;
                    CoreCommand::LightHs {
                        id: id.clone(),
                        hue,
                        saturation,
                    }
                }
                _ => {
                    return Err(CliError::Validation {
                        field: "color".into(),
                        reason: "pass --rgb R,G,B or --hue with --saturation".into(),
                    });
                }
            };
            let done = format!("{id} colour changed");
            util::execute(controller, cmd, &done, global).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rgb_accepts_spaced_triplets() {
        assert_eq!(parse_rgb("255, 128,0").unwrap(), [255, 128, 0]);
    }

    #[test]
    fn rgb_rejects_bad_input() {
        assert!(parse_rgb("255,128").is_err());
        assert!(parse_rgb("256,0,0").is_err());
        assert!(parse_rgb("red,green,blue").is_err());
    }

    #[test]
    fn hue_and_saturation_are_range_checked() {
        assert!(check_hs(120.0, 50.0).is_ok());
        assert!(check_hs(361.0, 50.0).is_err());
        assert!(check_hs(10.0, -1.0).is_err());
    }
}
