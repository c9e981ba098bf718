use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cli::RefineArgs;
use crate::retry::RetryPolicy;
use crate::snap::MAX_SNAP_BATCH;

/// Environment variable holding the API credential for both external services.
pub const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";

/// Everything a refinement run needs, resolved once at startup and passed in
/// explicitly. Credential problems abort here, before any work happens.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub target_count: usize,
    pub batch_size: usize,
    pub land_path: PathBuf,
    pub output_path: PathBuf,
    /// Persist every this many newly accepted points (0 = only at the end).
    pub checkpoint_every: usize,
    /// Give up after this many consecutive batches with no accepted point.
    pub max_idle_batches: usize,
    /// Throttle before each imagery metadata call.
    pub imagery_delay: Duration,
    /// Pause between snap batches.
    pub batch_delay: Duration,
    pub snap_retry: RetryPolicy,
}

impl Config {
    pub fn from_args(args: &RefineArgs) -> Result<Self> {
        let api_key = env::var(API_KEY_VAR)
            .with_context(|| format!("{API_KEY_VAR} is not set (required for road-snap and imagery requests)"))?;
        if api_key.trim().is_empty() {
            bail!("{API_KEY_VAR} is empty");
        }
        if args.batch_size == 0 || args.batch_size > MAX_SNAP_BATCH {
            bail!("batch size must be between 1 and {MAX_SNAP_BATCH}, got {}", args.batch_size);
        }
        Ok(Self {
            api_key,
            target_count: args.target,
            batch_size: args.batch_size,
            land_path: args.land.clone(),
            output_path: args.output.clone(),
            checkpoint_every: args.checkpoint_every,
            max_idle_batches: args.max_idle_batches,
            imagery_delay: Duration::from_millis(100),
            batch_delay: Duration::from_millis(100),
            snap_retry: RetryPolicy::default(),
        })
    }
}
