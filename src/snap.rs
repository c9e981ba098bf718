use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::types::Coordinate;

/// Hard per-request ceiling of the nearest-roads service.
pub const MAX_SNAP_BATCH: usize = 100;

const NEAREST_ROADS_URL: &str = "https://roads.googleapis.com/v1/nearestRoads";

/// Maps raw coordinates onto nearest-road coordinates. The returned list may
/// be shorter than the input and in any order: points the service cannot snap
/// are silently dropped, so callers must not assume positional correspondence.
pub trait SnapRoads {
    fn snap(&self, batch: &[Coordinate]) -> Result<Vec<Coordinate>>;
}

/// Blocking client for the Google Nearest Roads API.
pub struct NearestRoadsClient {
    http: Client,
    api_key: String,
}

impl NearestRoadsClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("roadsample/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, api_key: api_key.to_string() })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapResponse {
    #[serde(default)]
    snapped_points: Vec<SnappedPoint>,
}

#[derive(Deserialize)]
struct SnappedPoint {
    location: SnapLocation,
}

#[derive(Deserialize)]
struct SnapLocation {
    latitude: f64,
    longitude: f64,
}

impl SnapRoads for NearestRoadsClient {
    fn snap(&self, batch: &[Coordinate]) -> Result<Vec<Coordinate>> {
        if batch.len() > MAX_SNAP_BATCH {
            bail!("snap batch of {} exceeds the {MAX_SNAP_BATCH}-point service limit", batch.len());
        }
        let points = batch.iter()
            .map(|c| format!("{},{}", c.lat, c.lng))
            .collect::<Vec<_>>()
            .join("|");
        let resp = self.http.get(NEAREST_ROADS_URL)
            .query(&[("points", points.as_str()), ("key", self.api_key.as_str())])
            .send()
            .context("GET nearestRoads")?
            .error_for_status()
            .context("nearestRoads returned error status")?;
        let text = resp.text().context("read nearestRoads body")?;
        let parsed: SnapResponse =
            serde_json::from_str(&text).context("parse nearestRoads response")?;
        Ok(parsed.snapped_points.into_iter()
            .map(|p| Coordinate::new(p.location.latitude, p.location.longitude))
            .collect())
    }
}
