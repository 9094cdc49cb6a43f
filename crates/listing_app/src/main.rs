mod cli;
mod config;
mod logging;
mod run;

use clap::Parser;
use listing_logging::listing_info;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::resolve(&cli, |name| std::env::var(name).ok())?;

    if cli.print_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    logging::initialize(cli.log.into(), cli.verbose);
    match &cli.config {
        Some(path) => listing_info!("Configuration loaded from {}", path.display()),
        None => listing_info!("Using the {:?} preset", cli.preset),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stats = runtime.block_on(run::run(config))?;

    println!("{stats}");
    Ok(())
}
