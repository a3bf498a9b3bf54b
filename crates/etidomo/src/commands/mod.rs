//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod climate;
pub mod config_cmd;
pub mod covers;
pub mod devices;
pub mod energy;
pub mod lights;
pub mod scenarios;
pub mod sensors;
pub mod services;
pub mod switches;
pub mod topology;
pub mod util;
pub mod watch;

use etidomo_core::{Controller, ControllerConfig};
use tracing::debug;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Connect, run a controller-bound command, and always tear down.
///
/// Only `watch` keeps the background listeners running; every other
/// command is a single request-response cycle.
pub async fn dispatch(
    cmd: Command,
    mut config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return watch::handle(config, args, global).await;
    }

    config.listen = false;
    config.energy = false;
    config.keep_alive = false;

    let controller = Controller::new(config);
    controller.connect().await?;

    let result = run(cmd, &controller, global).await;

    let report = controller.disconnect().await;
    debug!(elapsed_ms = report.elapsed_ms, clean = report.is_clean(), "teardown complete");
    result
}

async fn run(cmd: Command, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, args, global),
        Command::Floors => topology::floors(controller, global),
        Command::Rooms => topology::rooms(controller, global),
        Command::Lights(args) => lights::handle(controller, args, global).await,
        Command::Covers(args) => covers::handle(controller, args, global).await,
        Command::Switches(args) => switches::handle(controller, args, global).await,
        Command::Climate(args) => climate::handle(controller, args, global).await,
        Command::Sensors => sensors::handle(controller, global),
        Command::Energy => energy::handle(controller, global).await,
        Command::Scenarios(args) => scenarios::handle(controller, args, global).await,
        Command::Services(args) => services::handle(controller, args, global).await,
        // Handled before connecting
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
