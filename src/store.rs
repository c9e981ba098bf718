use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::types::Coordinate;

/// Outcome of reading a persisted file that is allowed to be absent or broken.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    Missing,
    Malformed(String),
}

impl<T: Default> LoadOutcome<T> {
    /// Collapse to the loaded value, warning (once) if the file was malformed.
    /// A missing file is the normal first-run case and stays silent.
    pub fn unwrap_or_default(self, label: &str) -> T {
        match self {
            LoadOutcome::Loaded(value) => value,
            LoadOutcome::Missing => T::default(),
            LoadOutcome::Malformed(reason) => {
                eprintln!("[warn] {label}: {reason}; starting empty");
                T::default()
            }
        }
    }
}

/// Read a JSON file, distinguishing "not there" from "there but unreadable".
pub fn load_json_or_default<T: DeserializeOwned>(path: &Path) -> LoadOutcome<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(err) => return LoadOutcome::Malformed(format!("read {}: {}", path.display(), err)),
    };
    match serde_json::from_str(&text) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(err) => LoadOutcome::Malformed(format!("parse {}: {}", path.display(), err)),
    }
}

/// Write-then-rename JSON output, so a crash mid-write never corrupts the
/// previous file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    }
    let mut tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
        .context("create temp file")?;
    if pretty {
        serde_json::to_writer_pretty(&mut tmp, value)?;
    } else {
        serde_json::to_writer(&mut tmp, value)?;
    }
    tmp.flush()?;
    tmp.as_file().sync_all().ok(); // best-effort fsync file
    tmp.persist(path)
        .with_context(|| format!("rename to {}", path.display()))?;
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = File::open(dir).and_then(|f| f.sync_all());
    }
    Ok(())
}

/// Load the land point file: a JSON array of `[lat, lng]` pairs.
pub fn load_land_or_default(path: &Path) -> Vec<Coordinate> {
    load_json_or_default::<Vec<[f64; 2]>>(path)
        .unwrap_or_default("land point file")
        .into_iter()
        .map(|[lat, lng]| Coordinate::new(lat, lng))
        .collect()
}

/// Persist the land point file in the same `[lat, lng]` array layout.
pub fn save_land(path: &Path, points: &[Coordinate]) -> Result<()> {
    let pairs: Vec<[f64; 2]> = points.iter().map(|c| [c.lat, c.lng]).collect();
    write_json_atomic(path, &pairs, false)
}

/// Load the validated road point file: a JSON array of `{lat, lng}` objects.
pub fn load_validated_or_default(path: &Path) -> Vec<Coordinate> {
    load_json_or_default::<Vec<Coordinate>>(path).unwrap_or_default("validated point file")
}

/// Persist the validated road point file.
pub fn save_validated(path: &Path, points: &[Coordinate]) -> Result<()> {
    write_json_atomic(path, points, true)
}
