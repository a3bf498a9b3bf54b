mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Library crates log under their own targets; `-v` raises only ours,
/// `RUST_LOG` overrides everything.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = format!("warn,etidomo={level},etidomo_core={level},etidomo_api={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(verbosity > 1)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a controller connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global).await,

        Command::Completions(args) => {
            use clap::CommandFactory;

            let mut cmd = Cli::command();
            match args.dir {
                Some(dir) => {
                    let path = clap_complete::generate_to(args.shell, &mut cmd, "etidomo", dir)?;
                    eprintln!("✓ Completions written to {}", path.display());
                }
                None => {
                    clap_complete::generate(args.shell, &mut cmd, "etidomo", &mut std::io::stdout());
                }
            }
            Ok(())
        }

        // All other commands require a controller connection
        cmd => {
            let controller_config = config::build_controller_config(&cli.global)?;
            tracing::debug!(command = ?cmd, host = %controller_config.host, "dispatching command");
            commands::dispatch(cmd, controller_config, &cli.global).await
        }
    }
}
