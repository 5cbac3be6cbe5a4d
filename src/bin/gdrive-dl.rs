//! gdrive-dl CLI - Command-line interface for downloading Google Drive files.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::process::ExitCode;

use clap::Parser;
use gdrive_dl::cli::{Cli, run};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    run(Cli::parse()).await
}
