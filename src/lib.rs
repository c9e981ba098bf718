#![doc = "Roadsample public API"]
pub mod cli;
pub mod commands;

mod config;
mod imagery;
mod landmass;
mod pipeline;
mod retry;
mod sampler;
mod snap;
mod store;
mod types;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use imagery::{CheckImagery, StreetViewClient, SEARCH_RADIUS_M};

#[doc(inline)]
pub use landmass::Landmass;

#[doc(inline)]
pub use pipeline::{dedup_filter, RefinementPipeline, RunSummary};

#[doc(inline)]
pub use retry::RetryPolicy;

#[doc(inline)]
pub use sampler::generate;

#[doc(inline)]
pub use snap::{NearestRoadsClient, SnapRoads, MAX_SNAP_BATCH};

#[doc(inline)]
pub use store::{load_json_or_default, write_json_atomic, LoadOutcome};

#[doc(inline)]
pub use types::{Coordinate, Key, KeySet, KEY_PRECISION};
