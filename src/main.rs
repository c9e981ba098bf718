use anyhow::Result;
use clap::Parser;

use roadsample::cli::{Cli, Commands};
use roadsample::commands::{refine, sample};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Sample(args) => sample::run(&cli, args),
        Commands::Refine(args) => refine::run(&cli, args),
    }
}
