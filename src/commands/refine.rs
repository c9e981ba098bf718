use anyhow::Result;

use crate::cli::{Cli, RefineArgs};
use crate::config::Config;
use crate::imagery::StreetViewClient;
use crate::pipeline::RefinementPipeline;
use crate::snap::NearestRoadsClient;

pub fn run(cli: &Cli, args: &RefineArgs) -> Result<()> {
    let cfg = Config::from_args(args)?;
    let snapper = NearestRoadsClient::new(&cfg.api_key)?;
    let imagery = StreetViewClient::new(&cfg.api_key)?;
    let output = cfg.output_path.clone();

    let mut pipeline = RefinementPipeline::load(cfg, snapper, imagery, cli.verbose);
    let summary = pipeline.run(&mut rand::rng())?;

    println!(
        "Saved {} road coordinates ({} new, {} batches) -> {}",
        summary.total, summary.accepted, summary.batches, output.display(),
    );
    Ok(())
}
