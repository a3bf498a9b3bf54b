//! Integration services: force_update, pull_devices, refresh_scenarios.

use etidomo_core::{Controller, Reconciliation};
use serde::Serialize;

use crate::cli::{GlobalOpts, ServicesArgs, ServicesCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ServiceOutcome {
    service: &'static str,
    changed: usize,
}

fn summary(label: &str, changed: usize) -> String {
    format!("{label}: {changed}")
}

fn reconciliation_detail(rec: &Reconciliation) -> String {
    let mut lines = vec![
        format!("Added:   {}", rec.added.len()),
        format!("Removed: {}", rec.removed.len()),
        format!("Updated: {}", rec.updated),
    ];
    lines.extend(rec.added.iter().map(|id| format!("  + {id}")));
    lines.extend(rec.removed.iter().map(|id| format!("  - {id}")));
    lines.join("\n")
}

pub async fn handle(
    controller: &Controller,
    args: ServicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ServicesCommand::ForceUpdate => {
            let changed = controller.force_update().await?;
            let outcome = ServiceOutcome {
                service: "force_update",
                changed,
            };
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| summary("Devices changed", o.changed),
                |o| o.changed.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ServicesCommand::PullDevices => {
            let rec = controller.pull_devices().await?;
            let out = output::render_single(&global.output, &rec, reconciliation_detail, |r| {
                r.added
                    .iter()
                    .map(|id| format!("+{id}"))
                    .chain(r.removed.iter().map(|id| format!("-{id}")))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ServicesCommand::RefreshScenarios => {
            let count = controller.refresh_scenarios().await?;
            let outcome = ServiceOutcome {
                service: "refresh_scenarios",
                changed: count,
            };
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| summary("Scenarios", o.changed),
                |o| o.changed.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
