//! Opening command handlers.

use std::sync::Arc;

use etidomo_core::{Command as CoreCommand, Controller, CoverAction, Device, DeviceKind};
use tabled::Tabled;

use crate::cli::{CoversArgs, CoversCommand, GlobalOpts, Target};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct CoverRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Open ID")]
    open_act_id: String,
    #[tabled(rename = "Close ID")]
    close_act_id: String,
}

fn row(d: &Arc<Device>, color: bool) -> CoverRow {
    let view = d.opening();
    let state = view.map_or_else(|| "unknown".into(), |o| o.summary());
    CoverRow {
        entity: d.entity_id.to_string(),
        name: d.name.clone(),
        state: output::paint_state(&state, view.is_some_and(|o| o.is_open()), color),
        open_act_id: util::or_dash(d.act_id),
        close_act_id: util::or_dash(view.and_then(|o| o.close_act_id())),
    }
}

async fn move_cover(
    controller: &Controller,
    target: &Target,
    action: CoverAction,
    verb: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::resolve_device(controller, target, DeviceKind::Opening)?;
    let done = format!("{id} {verb}");
    util::execute(controller, CoreCommand::Cover { id, action }, &done, global).await
}

pub async fn handle(
    controller: &Controller,
    args: CoversArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CoversCommand::List => {
            let color = output::should_color(&global.color);
            let covers = controller.store().devices_of_kind(DeviceKind::Opening);
            let out = output::render_list(
                &global.output,
                &covers,
                |d| row(d, color),
                |d| d.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        CoversCommand::Open(t) => {
            move_cover(controller, &t, CoverAction::Open, "opening", global).await
        }
        CoversCommand::Close(t) => {
            move_cover(controller, &t, CoverAction::Close, "closing", global).await
        }
        CoversCommand::Stop(t) => {
            move_cover(controller, &t, CoverAction::Stop, "stopped", global).await
        }
        CoversCommand::SlatOpen(t) => {
            move_cover(controller, &t, CoverAction::SlatOpen, "slats opening", global).await
        }
        CoversCommand::SlatClose(t) => {
            move_cover(controller, &t, CoverAction::SlatClose, "slats closing", global).await
        }
    }
}
