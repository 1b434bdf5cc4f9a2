mod agents;
mod cli;
mod config;
mod error;
mod logging;
mod manifest;
mod pipeline;
mod registry;
mod safety;
mod selection;
mod utils;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::RunConfig;
use pipeline::EXIT_FAILURE;
use std::process;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = RunConfig::from_cli(&cli);
    let result = match cli.command {
        Commands::Update { .. } => workflow::execute_update(&config),
        Commands::Check { .. } => workflow::execute_check(&config),
        Commands::List => workflow::execute_list(&config),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(EXIT_FAILURE);
        }
    }
}
