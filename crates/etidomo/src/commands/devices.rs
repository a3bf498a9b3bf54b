//! Device command handlers.

use std::sync::Arc;

use etidomo_core::{Controller, Device, Platform};
use tabled::Tabled;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, PlatformArg};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Act ID")]
    act_id: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            entity: d.entity_id.to_string(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            act_id: util::or_dash(d.act_id),
            room: util::or_dash(d.room_id),
            state: d.state_summary(),
        }
    }
}

fn detail(d: &Arc<Device>) -> String {
    let mut lines = vec![
        format!("Entity:   {}", d.entity_id),
        format!("Name:     {}", d.name),
        format!("Type:     {} ({})", d.kind, d.kind.type_id()),
        format!("Act ID:   {}", util::or_dash(d.act_id)),
        format!("Floor:    {}", util::or_dash(d.floor_id)),
        format!("Room:     {}", util::or_dash(d.room_id)),
        format!("State:    {}", d.state_summary()),
    ];
    if let Some(class) = &d.device_class {
        lines.push(format!("Class:    {class}"));
    }
    lines.push("Record:".into());
    for (key, value) in &d.record {
        lines.push(format!("  {key}: {value}"));
    }
    lines.join("\n")
}

fn platform_of(arg: PlatformArg) -> Platform {
    match arg {
        PlatformArg::Light => Platform::Light,
        PlatformArg::Cover => Platform::Cover,
        PlatformArg::Climate => Platform::Climate,
        PlatformArg::Switch => Platform::Switch,
        PlatformArg::Sensor => Platform::Sensor,
        PlatformArg::BinarySensor => Platform::BinarySensor,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List { platform } => {
            let wanted = platform.map(platform_of);
            let snap: Vec<Arc<Device>> = controller
                .devices_snapshot()
                .iter()
                .filter(|d| wanted.is_none_or(|p| d.entity_id.platform() == p))
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &snap,
                |d| DeviceRow::from(d),
                |d| d.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Show(target) => {
            let device = util::resolve_any_device(controller, &target)?;
            let out = output::render_single(&global.output, &device, detail, |d| {
                d.entity_id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
