//! Live event stream: keeps the controller's background tasks running and
//! prints every event until Ctrl-C or `--duration` elapses.

use std::sync::Arc;
use std::time::Duration;

use etidomo_core::{Controller, ControllerConfig, DomoEvent, TeardownReport};
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: ControllerConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    config.listen = true;
    config.keep_alive = true;
    config.energy = !args.no_energy;

    let controller = Controller::new(config);
    let mut events = controller.events();
    controller.connect().await?;

    if !global.quiet {
        eprintln!(
            "Watching {} devices and {} scenarios (Ctrl-C to stop)",
            controller.store().device_count(),
            controller.store().scenario_count()
        );
    }

    let color = output::should_color(&global.color);
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
            () = &mut deadline => break Ok(()),
            recv = events.recv() => match recv {
                Ok(event) => {
                    if let Err(e) = print_event(&event, &global.output, color) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event stream lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    let report = controller.disconnect().await;
    if global.verbose > 0 && !global.quiet {
        eprintln!("{}", teardown_summary(&report));
    }
    result
}

fn print_event(event: &Arc<DomoEvent>, format: &OutputFormat, color: bool) -> Result<(), CliError> {
    let line = match format {
        OutputFormat::Table | OutputFormat::Plain => event_line(event, color),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json(event.as_ref(), true)?
        }
        OutputFormat::Yaml => {
            let mut doc = serde_yaml::to_string(event.as_ref())
                .map_err(|e| CliError::Render(e.to_string()))?;
            doc.insert_str(0, "---\n");
            doc.trim_end().to_owned()
        }
    };
    output::print_output(&line, false);
    Ok(())
}

fn event_line(event: &DomoEvent, color: bool) -> String {
    let at = event.at().format("%H:%M:%S").to_string();
    let at = if color { at.dimmed().to_string() } else { at };
    let body = match event {
        DomoEvent::DeviceUpdated { device, .. } => {
            format!("{} {}", device.entity_id, device.state_summary())
        }
        DomoEvent::DevicesAdded { entity_ids, .. } => format!("added {}", join_ids(entity_ids)),
        DomoEvent::DevicesRemoved { entity_ids, .. } => {
            format!("removed {}", join_ids(entity_ids))
        }
        DomoEvent::ScenariosRefreshed { count, .. } => format!("{count} scenarios loaded"),
        DomoEvent::ScenarioStatus { scenario, .. } => format!(
            "{} {}",
            scenario.entity_id,
            if scenario.is_active() { "running" } else { "idle" }
        ),
        DomoEvent::PlantChanged { .. } => "plant configuration changed".into(),
        DomoEvent::ConnectionChanged { state, .. } => format!("connection {state:?}"),
        other => format!("{other:?}"),
    };
    format!("{at} {body}")
}

fn join_ids(ids: &[etidomo_core::EntityId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn teardown_summary(report: &TeardownReport) -> String {
    let mut lines = vec![format!(
        "Stopped in {} ms (energy persisted: {})",
        report.elapsed_ms, report.energy_persisted
    )];
    for outcome in &report.tasks {
        lines.push(format!(
            "  {}: {} after {} ms",
            outcome.task, outcome.exit, outcome.waited_ms
        ));
    }
    lines.join("\n")
}
