use std::process::ExitCode;

use clap::Parser;
use herd_lab::config::{Args, RunConfig};
use herd_lab::{logging, server};

fn main() -> ExitCode {
    let config = RunConfig::from(Args::parse());
    logging::init();
    log::debug!("{config:?}");

    let supervisor = server::Supervisor { config };

    match supervisor.start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            logging::report_fatal(&error);
            ExitCode::FAILURE
        }
    }
}
