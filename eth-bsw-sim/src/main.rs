//! Runs a grandmaster and a bridge against each other on a simulated cable
//! and logs how well the bridge follows the grandmaster.

mod config;
mod logging;
mod sim;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;

use crate::{config::SimConfig, logging::LogLevel, sim::Simulation};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file to use
    #[clap(
        long = "config",
        short = 'c',
        default_value = "sim.toml",
        value_name = "FILE"
    )]
    config_file: PathBuf,

    /// Overrides the log level of the configuration file
    #[clap(long, short = 'l', value_enum)]
    log_level: Option<LogLevel>,

    /// Overrides the number of simulated main function periods
    #[clap(long, short = 't')]
    ticks: Option<u64>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match SimConfig::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            logging::tracing_init(args.log_level.unwrap_or_default(), true);
            error!(file = %args.config_file.display(), "{e}");
            return ExitCode::FAILURE;
        }
    };
    logging::tracing_init(args.log_level.unwrap_or(config.log_level), true);

    let ticks = args.ticks.unwrap_or(config.ticks);
    let speedup = config.speedup;
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            error!("could not set up simulation: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(sim.run(ticks, speedup));

    ExitCode::SUCCESS
}
