use anyhow::{bail, Result};
use geo::{Point, Rect};
use rand::Rng;

use crate::types::{Coordinate, KeySet};

/// Rejection-sample `count` fresh land points inside `bounds`.
///
/// Draws uniform points until `count` of them pass the land predicate with a
/// rounded key not yet in `existing`; accepted keys are added to `existing`.
/// Returns the accepted points and the total number of raw draws. There is no
/// attempt ceiling: a predicate that is almost never true over a huge region
/// will keep drawing. Bounds must span a positive area on both axes.
pub fn generate<F, R>(
    count: usize,
    bounds: Rect<f64>,
    is_land: F,
    existing: &mut KeySet,
    rng: &mut R,
) -> Result<(Vec<Coordinate>, u64)>
where
    F: Fn(Point<f64>) -> bool,
    R: Rng + ?Sized,
{
    if !(bounds.min().x < bounds.max().x) || !(bounds.min().y < bounds.max().y) {
        bail!(
            "degenerate sampling bounds [{},{}]..[{},{}]",
            bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y,
        );
    }
    let mut fresh = Vec::with_capacity(count);
    let mut draws: u64 = 0;
    while fresh.len() < count {
        let x = rng.random_range(bounds.min().x..bounds.max().x);
        let y = rng.random_range(bounds.min().y..bounds.max().y);
        draws += 1;
        if !is_land(Point::new(x, y)) {
            continue;
        }
        let point = Coordinate::new(y, x); // (lat, lng)
        if existing.insert(point.key()) {
            fresh.push(point);
        }
    }
    Ok((fresh, draws))
}
