//! Relay command handlers.

use std::sync::Arc;

use etidomo_core::{Command as CoreCommand, Controller, Device, DeviceKind};
use tabled::Tabled;

use crate::cli::{GlobalOpts, SwitchesArgs, SwitchesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
}

fn row(d: &Arc<Device>, color: bool) -> SwitchRow {
    SwitchRow {
        entity: d.entity_id.to_string(),
        name: d.name.clone(),
        state: output::paint_state(&d.state_summary(), d.is_on(), color),
    }
}

pub async fn handle(
    controller: &Controller,
    args: SwitchesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SwitchesCommand::List => {
            let color = output::should_color(&global.color);
            let relays = controller.store().devices_of_kind(DeviceKind::Relay);
            let out = output::render_list(
                &global.output,
                &relays,
                |d| row(d, color),
                |d| d.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        SwitchesCommand::On(target) => {
            let id = util::resolve_device(controller, &target, DeviceKind::Relay)?;
            let done = format!("{id} on");
            util::execute(controller, CoreCommand::SwitchOn { id }, &done, global).await
        }
        SwitchesCommand::Off(target) => {
            let id = util::resolve_device(controller, &target, DeviceKind::Relay)?;
            let done = format!("{id} off");
            util::execute(controller, CoreCommand::SwitchOff { id }, &done, global).await
        }
    }
}
