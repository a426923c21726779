mod args;
mod scenarios;

use crate::args::{Cli, Scenario};
use anyhow::Context;
use clap::Parser;
use herald_logger::Logger;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = Logger::builder().name(env!("CARGO_PKG_NAME")).level(cli.level).json(cli.json);
    if let Some(filter) = &cli.env_filter {
        logger = logger.env_filter(filter.as_str());
    }
    if let Some(dir) = &cli.log_dir {
        logger = logger.path(dir);
    }
    let _log = logger.init().context("Critical: logger could not be initialized")?;

    tracing::info!(scenario = ?cli.scenario, "Starting demo");
    match cli.scenario {
        Scenario::Basic => scenarios::basic()?,
        Scenario::Transactional => scenarios::transactional()?,
        Scenario::Concurrent => scenarios::concurrent(cli.publishers.into())?,
    }

    Ok(())
}
