pub mod build;

use clap::Parser;

/// outpost-data - build game data from content declarations
#[derive(Parser, Debug)]
#[command(name = "outpost-data")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub build: build::BuildArgs,
}
