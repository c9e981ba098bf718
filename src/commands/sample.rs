use anyhow::Result;

use crate::cli::{Cli, SampleArgs};
use crate::landmass::Landmass;
use crate::types::{Coordinate, KeySet};
use crate::{sampler, store};

pub fn run(cli: &Cli, args: &SampleArgs) -> Result<()> {
    let landmass = Landmass::from_shapefile(&args.shapefile)?;
    if cli.verbose > 0 {
        let b = landmass.bounds();
        eprintln!(
            "[sample] {} landmass shapes, bounds [{:.3},{:.3}]..[{:.3},{:.3}]",
            landmass.len(), b.min().x, b.min().y, b.max().x, b.max().y,
        );
    }

    // The land file only ever grows: keep everything already there and
    // filter fresh draws against its keys.
    let mut points = store::load_land_or_default(&args.output);
    let mut keys: KeySet = points.iter().map(Coordinate::key).collect();
    if cli.verbose > 0 && !points.is_empty() {
        eprintln!("[sample] extending {} existing land points", points.len());
    }

    let (fresh, draws) = sampler::generate(
        args.count,
        landmass.bounds(),
        |p| landmass.contains(p),
        &mut keys,
        &mut rand::rng(),
    )?;
    points.extend(fresh);

    store::save_land(&args.output, &points)?;
    println!(
        "Generated {} new land coordinates in {} draws ({} total) -> {}",
        args.count, draws, points.len(), args.output.display(),
    );
    Ok(())
}
