//! Scenario command handlers.

use std::sync::Arc;

use etidomo_core::{Command as CoreCommand, Controller, Scenario};
use tabled::Tabled;

use crate::cli::{GlobalOpts, ScenariosArgs, ScenariosCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ScenarioRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "State")]
    state: String,
}

fn row(s: &Arc<Scenario>, color: bool) -> ScenarioRow {
    let state = if s.is_active() { "running" } else { "idle" };
    ScenarioRow {
        entity: s.entity_id.to_string(),
        id: s.id,
        name: s.name.clone(),
        user: if s.user_defined { "yes" } else { "no" }.into(),
        state: output::paint_state(state, s.is_active(), color),
    }
}

pub async fn handle(
    controller: &Controller,
    args: ScenariosArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ScenariosCommand::List => {
            let color = output::should_color(&global.color);
            let snap = controller.scenarios_snapshot();
            let out = output::render_list(
                &global.output,
                &snap,
                |s| row(s, color),
                |s| s.entity_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ScenariosCommand::Activate(target) => {
            let id = util::resolve_scenario(controller, &target)?;
            let done = format!("{id} activated");
            util::execute(controller, CoreCommand::ActivateScenario { id }, &done, global).await
        }

        ScenariosCommand::Create { name } => {
            let done = format!("Recording of scenario '{name}' started on the controller");
            util::execute(controller, CoreCommand::CreateScenario { name }, &done, global).await
        }

        ScenariosCommand::Delete(target) => {
            let id = util::resolve_scenario(controller, &target)?;
            if !util::confirm(&format!("Delete scenario {id}?"), global.yes)? {
                return Ok(());
            }
            let done = format!("{id} deleted");
            util::execute(controller, CoreCommand::DeleteScenario { id }, &done, global).await
        }
    }
}
