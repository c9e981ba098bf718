use anyhow::{bail, Result};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::Config;
use crate::imagery::CheckImagery;
use crate::snap::SnapRoads;
use crate::store;
use crate::types::{Coordinate, KeySet};

/// What a refinement run did.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Points newly accepted by this run.
    pub accepted: usize,
    /// Size of the persisted set after the run.
    pub total: usize,
    /// Snap batches issued.
    pub batches: u64,
}

/// Drives land points through snap → dedup → imagery validation, accumulating
/// into the persisted validated set. One instance owns all run state; nothing
/// is shared or global.
pub struct RefinementPipeline<S, V> {
    cfg: Config,
    snapper: S,
    imagery: V,
    verbose: u8,
    land: Vec<Coordinate>,
    validated: Vec<Coordinate>,
    seen: KeySet,
}

/// Drop within-batch duplicates (by rounded key, keeping first occurrence),
/// then anything whose key is already in `seen`.
pub fn dedup_filter(snapped: &[Coordinate], seen: &KeySet) -> Vec<Coordinate> {
    let mut batch_keys = KeySet::default();
    snapped.iter()
        .filter(|c| batch_keys.insert(c.key()) && !seen.contains(&c.key()))
        .copied()
        .collect()
}

impl<S: SnapRoads, V: CheckImagery> RefinementPipeline<S, V> {
    /// LOAD_STATE: read both persisted sets (missing or malformed files start
    /// empty, never abort) and rebuild the seen-key set from the validated one.
    pub fn load(cfg: Config, snapper: S, imagery: V, verbose: u8) -> Self {
        let land = store::load_land_or_default(&cfg.land_path);
        let validated = store::load_validated_or_default(&cfg.output_path);
        let seen: KeySet = validated.iter().map(Coordinate::key).collect();
        if verbose > 0 {
            eprintln!(
                "[refine] loaded {} land points, {} validated points",
                land.len(),
                validated.len()
            );
        }
        Self { cfg, snapper, imagery, verbose, land, validated, seen }
    }

    /// Run until `target_count` new points are accepted, persisting along the
    /// way. Only an empty land set, snap-retry exhaustion, or a no-progress
    /// ceiling stop the run early; rejected points are just skipped.
    pub fn run(&mut self, rng: &mut impl Rng) -> Result<RunSummary> {
        let mut accepted = 0usize;
        let mut idle = 0usize;
        let mut batches = 0u64;

        while accepted < self.cfg.target_count {
            if self.land.is_empty() {
                bail!("land point set is empty; generate land points first");
            }
            batches += 1;

            // SAMPLE_BATCH: without replacement within the batch.
            let size = self.cfg.batch_size.min(self.land.len());
            let batch: Vec<Coordinate> =
                self.land.choose_multiple(rng, size).copied().collect();

            // SNAP: bounded retry of the same batch; exhaustion aborts the
            // run, but never discards points accepted since the last persist.
            let retry = self.cfg.snap_retry;
            let snapper = &self.snapper;
            let snapped = match retry.run("snap batch", || snapper.snap(&batch)) {
                Ok(snapped) => snapped,
                Err(err) => {
                    self.persist()?;
                    return Err(err);
                }
            };

            let candidates = dedup_filter(&snapped, &self.seen);
            eprintln!(
                "[refine] batch {batches}: sent {}, snapped {}, candidates {}",
                batch.len(),
                snapped.len(),
                candidates.len()
            );

            // VALIDATE_EACH: sequential, throttled per call.
            let before = accepted;
            for point in candidates {
                if accepted >= self.cfg.target_count {
                    break;
                }
                std::thread::sleep(self.cfg.imagery_delay);
                if !self.imagery.has_imagery(point) {
                    continue;
                }
                self.seen.insert(point.key());
                self.validated.push(point);
                accepted += 1;
                if self.verbose > 0 {
                    eprintln!(
                        "[refine] accepted {:.7},{:.7} ({accepted}/{})",
                        point.lat, point.lng, self.cfg.target_count
                    );
                }
                if self.cfg.checkpoint_every > 0 && accepted % self.cfg.checkpoint_every == 0 {
                    self.persist()?;
                }
            }

            if accepted == before {
                idle += 1;
                if idle >= self.cfg.max_idle_batches {
                    self.persist()?;
                    bail!(
                        "no new points accepted in {idle} consecutive batches; \
                         land point supply looks exhausted"
                    );
                }
            } else {
                idle = 0;
            }
            std::thread::sleep(self.cfg.batch_delay);
        }

        self.persist()?;
        Ok(RunSummary { accepted, total: self.validated.len(), batches })
    }

    fn persist(&self) -> Result<()> {
        store::save_validated(&self.cfg.output_path, &self.validated)
    }

    /// The accumulated validated set (previously persisted + this run's).
    pub fn validated(&self) -> &[Coordinate] {
        &self.validated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::time::Duration;

    /// Snapper stub that replays a fixed response forever.
    struct FixedSnapper(Vec<Coordinate>);

    impl SnapRoads for FixedSnapper {
        fn snap(&self, _batch: &[Coordinate]) -> Result<Vec<Coordinate>> {
            Ok(self.0.clone())
        }
    }

    /// Snapper stub that drains scripted responses, then keeps returning the
    /// last one.
    struct ScriptedSnapper(RefCell<Vec<Vec<Coordinate>>>);

    impl SnapRoads for ScriptedSnapper {
        fn snap(&self, _batch: &[Coordinate]) -> Result<Vec<Coordinate>> {
            let mut script = self.0.borrow_mut();
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                Ok(script[0].clone())
            }
        }
    }

    struct AlwaysImagery;

    impl CheckImagery for AlwaysImagery {
        fn has_imagery(&self, _point: Coordinate) -> bool {
            true
        }
    }

    /// Alternates true/false starting with true.
    struct AlternatingImagery(Cell<bool>);

    impl AlternatingImagery {
        fn new() -> Self {
            Self(Cell::new(true))
        }
    }

    impl CheckImagery for AlternatingImagery {
        fn has_imagery(&self, _point: Coordinate) -> bool {
            let answer = self.0.get();
            self.0.set(!answer);
            answer
        }
    }

    fn test_config(dir: &Path, target: usize) -> Config {
        Config {
            api_key: "test".into(),
            target_count: target,
            batch_size: 10,
            land_path: dir.join("land.json"),
            output_path: dir.join("roads.json"),
            checkpoint_every: 0,
            max_idle_batches: 3,
            imagery_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            snap_retry: RetryPolicy { max_attempts: 2, base_delay: Duration::ZERO },
        }
    }

    fn seed_land(path: &Path, count: usize) {
        let points: Vec<Coordinate> =
            (0..count).map(|i| Coordinate::new(i as f64 * 0.001, 1.0)).collect();
        store::save_land(path, &points).unwrap();
    }

    #[test]
    fn dedup_filter_drops_batch_duplicates_and_seen_keys() {
        let old = Coordinate::new(5.0, 6.0);
        let novel = Coordinate::new(1.0, 2.0);
        let mut seen = KeySet::default();
        seen.insert(old.key());
        // One within-batch duplicate pair and one already-seen pair.
        let snapped = vec![novel, Coordinate::new(1.00000001, 1.99999999), old];
        let candidates = dedup_filter(&snapped, &seen);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key(), novel.key());
    }

    #[test]
    fn alternating_validator_accepts_half() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 2);
        seed_land(&cfg.land_path, 10);
        let snapped: Vec<Coordinate> =
            (1..=4).map(|i| Coordinate::new(10.0 + i as f64, 20.0)).collect();
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(snapped), AlternatingImagery::new(), 0);
        let summary = pipeline.run(&mut StdRng::seed_from_u64(1)).unwrap();
        // 4 candidates, alternating true/false: 2 accepted, 2 discarded.
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.batches, 1);
    }

    #[test]
    fn final_set_has_unique_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 3);
        let output = cfg.output_path.clone();
        seed_land(&cfg.land_path, 10);
        // The same three points come back on every batch; only the first
        // batch may accept them.
        let snapped: Vec<Coordinate> =
            (1..=3).map(|i| Coordinate::new(30.0 + i as f64, -40.0)).collect();
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(snapped), AlwaysImagery, 0);
        pipeline.run(&mut StdRng::seed_from_u64(2)).unwrap();

        let persisted = store::load_validated_or_default(&output);
        let keys: KeySet = persisted.iter().map(Coordinate::key).collect();
        assert_eq!(keys.len(), persisted.len());
    }

    #[test]
    fn resumption_with_zero_target_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 0);
        let output = cfg.output_path.clone();
        seed_land(&cfg.land_path, 5);
        let prior = vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)];
        store::save_validated(&output, &prior).unwrap();
        let before = std::fs::read(&output).unwrap();

        for _ in 0..2 {
            let mut pipeline = RefinementPipeline::load(
                cfg.clone(),
                FixedSnapper(vec![]),
                AlwaysImagery,
                0,
            );
            let summary = pipeline.run(&mut StdRng::seed_from_u64(3)).unwrap();
            assert_eq!(summary.accepted, 0);
            assert_eq!(summary.total, 2);
        }
        assert_eq!(std::fs::read(&output).unwrap(), before);
    }

    #[test]
    fn run_only_appends_to_prior_points() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 1);
        let output = cfg.output_path.clone();
        seed_land(&cfg.land_path, 5);
        let prior = vec![Coordinate::new(1.0, 2.0)];
        store::save_validated(&output, &prior).unwrap();

        let fresh = Coordinate::new(50.0, 60.0);
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(vec![fresh]), AlwaysImagery, 0);
        pipeline.run(&mut StdRng::seed_from_u64(4)).unwrap();

        let after = store::load_validated_or_default(&output);
        let after_keys: KeySet = after.iter().map(Coordinate::key).collect();
        for p in &prior {
            assert!(after_keys.contains(&p.key()));
        }
        assert!(after_keys.contains(&fresh.key()));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn already_seen_points_are_not_revalidated() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 1);
        let output = cfg.output_path.clone();
        seed_land(&cfg.land_path, 5);
        let prior = Coordinate::new(7.0, 8.0);
        store::save_validated(&output, &[prior]).unwrap();

        let fresh = Coordinate::new(9.0, 10.0);
        // Prior point keeps coming back from the snapper alongside the fresh one.
        let snapper = ScriptedSnapper(RefCell::new(vec![vec![prior, fresh]]));
        let mut pipeline = RefinementPipeline::load(cfg, snapper, AlternatingImagery::new(), 0);
        let summary = pipeline.run(&mut StdRng::seed_from_u64(5)).unwrap();

        // The alternating validator answers true first; had the prior point
        // been revalidated it would have consumed that answer.
        assert_eq!(summary.accepted, 1);
        let after = store::load_validated_or_default(&output);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn malformed_output_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 1);
        seed_land(&cfg.land_path, 5);
        std::fs::write(&cfg.output_path, "[{\"lat\": 1.0,").unwrap();

        let fresh = Coordinate::new(11.0, 12.0);
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(vec![fresh]), AlwaysImagery, 0);
        let summary = pipeline.run(&mut StdRng::seed_from_u64(6)).unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.total, 1);
    }

    /// Snapper stub whose first call succeeds, after which every call fails.
    struct FailAfterFirst {
        calls: Cell<u32>,
        point: Coordinate,
    }

    impl SnapRoads for FailAfterFirst {
        fn snap(&self, _batch: &[Coordinate]) -> Result<Vec<Coordinate>> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n == 0 {
                Ok(vec![self.point])
            } else {
                Err(anyhow::anyhow!("snap service down"))
            }
        }
    }

    #[test]
    fn snap_exhaustion_persists_points_accepted_so_far() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 2);
        let output = cfg.output_path.clone();
        seed_land(&cfg.land_path, 10);
        // checkpoint_every is 0, so nothing has been persisted when the
        // second batch's retries run out.
        let point = Coordinate::new(21.0, 22.0);
        let snapper = FailAfterFirst { calls: Cell::new(0), point };
        let mut pipeline = RefinementPipeline::load(cfg, snapper, AlwaysImagery, 0);
        let err = pipeline.run(&mut StdRng::seed_from_u64(9)).unwrap_err();
        assert!(format!("{err:#}").contains("retries exhausted"));

        let persisted = store::load_validated_or_default(&output);
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].key(), point.key());
    }

    #[test]
    fn idle_batches_hit_the_no_progress_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 1);
        seed_land(&cfg.land_path, 5);
        // Snapper never returns anything new.
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(vec![]), AlwaysImagery, 0);
        let err = pipeline.run(&mut StdRng::seed_from_u64(7)).unwrap_err();
        assert!(err.to_string().contains("no new points accepted"));
    }

    #[test]
    fn empty_land_set_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), 1);
        let mut pipeline =
            RefinementPipeline::load(cfg, FixedSnapper(vec![]), AlwaysImagery, 0);
        let err = pipeline.run(&mut StdRng::seed_from_u64(8)).unwrap_err();
        assert!(err.to_string().contains("land point set is empty"));
    }
}
