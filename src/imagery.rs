use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::types::Coordinate;

/// Search radius, in meters, handed to the metadata service.
pub const SEARCH_RADIUS_M: u32 = 50;

const METADATA_URL: &str = "https://maps.googleapis.com/maps/api/streetview/metadata";

/// Confirms that ground-level imagery exists near a coordinate.
/// Failures are conservatively reported as "no imagery", never as errors;
/// throttling between calls is the caller's responsibility.
pub trait CheckImagery {
    fn has_imagery(&self, point: Coordinate) -> bool;
}

/// Blocking client for the Street View metadata API.
pub struct StreetViewClient {
    http: Client,
    api_key: String,
}

impl StreetViewClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("roadsample/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, api_key: api_key.to_string() })
    }

    fn query(&self, point: Coordinate) -> Result<bool> {
        let location = format!("{},{}", point.lat, point.lng);
        let radius = SEARCH_RADIUS_M.to_string();
        let resp = self.http.get(METADATA_URL)
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .context("GET streetview metadata")?
            .error_for_status()
            .context("streetview metadata returned error status")?;
        let text = resp.text().context("read metadata body")?;
        let parsed: MetadataResponse =
            serde_json::from_str(&text).context("parse metadata response")?;
        Ok(parsed.is_available())
    }
}

#[derive(Deserialize)]
struct MetadataResponse {
    status: String,
}

impl MetadataResponse {
    /// "OK" is the service's explicit imagery-available status; everything
    /// else ("ZERO_RESULTS", "NOT_FOUND", quota errors, ...) is a miss.
    fn is_available(&self) -> bool {
        self.status == "OK"
    }
}

impl CheckImagery for StreetViewClient {
    fn has_imagery(&self, point: Coordinate) -> bool {
        match self.query(point) {
            Ok(available) => available,
            Err(err) => {
                eprintln!("[warn] imagery check failed at {},{}: {err:#}", point.lat, point.lng);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MetadataResponse;

    #[test]
    fn only_ok_status_counts_as_available() {
        let ok: MetadataResponse = serde_json::from_str(r#"{"status": "OK"}"#).unwrap();
        assert!(ok.is_available());
        for status in ["ZERO_RESULTS", "NOT_FOUND", "OVER_QUERY_LIMIT", "REQUEST_DENIED"] {
            let resp: MetadataResponse =
                serde_json::from_str(&format!(r#"{{"status": "{status}"}}"#)).unwrap();
            assert!(!resp.is_available());
        }
    }
}
