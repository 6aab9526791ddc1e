use std::process::ExitCode;

use clap::Parser;

use crate::config::{DaemonOptions, Options};
use crate::daemon::Daemon;
use crate::handler::CommandHandler;
use crate::runtime::docker::DockerRuntime;

mod cli;
mod config;
mod config_file;
mod daemon;
mod handler;
mod runtime;
mod signals;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();

    let args = cli::Args::parse();
    let options = match Options::resolve(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let handler = CommandHandler::new(options.cmd());
    let daemon = match Daemon::new(&options, DockerRuntime, handler) {
        Ok(daemon) => daemon,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let (trigger, shutdown) = signals::shutdown_channel();
    if let Err(err) = signals::handle_shutdown(trigger) {
        log::error!("Unable to install signal handlers: {err}");
        return ExitCode::FAILURE;
    }

    log::info!(
        "Dispatching events from {} to {:?}",
        options.endpoint(),
        options.cmd()
    );
    daemon.run(shutdown).await;

    ExitCode::SUCCESS
}
