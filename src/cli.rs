use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Land-point sampling and road refinement CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "roadsample", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate land-only coordinates from a landmass shapefile
    Sample(SampleArgs),

    /// Snap land points to roads and keep only imagery-verified ones
    Refine(RefineArgs),
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Landmass shapefile, e.g. Natural Earth ne_110m_admin_0_countries.shp
    #[arg(value_hint = ValueHint::FilePath)]
    pub shapefile: PathBuf,

    /// Land point file to create or extend
    #[arg(short, long, default_value = "land_coordinates.json", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// How many new land points to add
    #[arg(short, long, default_value_t = 10_000)]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Land point file produced by `sample`
    #[arg(long, default_value = "land_coordinates.json", value_hint = ValueHint::FilePath)]
    pub land: PathBuf,

    /// Validated road point file to create or extend
    #[arg(short, long, default_value = "roads_coords.json", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// How many new validated points to accept before stopping
    #[arg(short, long, default_value_t = 150)]
    pub target: usize,

    /// Points per road-snap request (service limit is 100)
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Persist after every N accepted points (0 persists only at the end)
    #[arg(long, default_value_t = 25)]
    pub checkpoint_every: usize,

    /// Abort after this many consecutive batches without progress
    #[arg(long, default_value_t = 20)]
    pub max_idle_batches: usize,
}
