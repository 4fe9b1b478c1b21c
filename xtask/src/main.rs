use anyhow::Result;
use clap::Parser;

mod app;
mod cli;
mod logger;
mod tasks;

fn main() -> Result<()> {
    let cli = crate::cli::Cli::parse();
    crate::logger::init(cli.log_level.into())?;
    crate::app::run(cli)
}
