use clap::Parser;
use miette::Result;
use outpost_data::cli::Cli;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    outpost_data::cli::build::run(cli.build)?;
    Ok(())
}
