use serde::{Deserialize, Serialize};

/// Decimal digits kept when rounding a coordinate into a dedup key.
pub const KEY_PRECISION: u32 = 7;

/// A point on the Earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Rounded key used for dedup; absorbs floating-point snapping jitter.
    #[inline]
    pub fn key(&self) -> Key {
        Key { lat_e7: scale_e7(self.lat), lng_e7: scale_e7(self.lng) }
    }
}

/// A coordinate rounded to [`KEY_PRECISION`] decimal digits, held as e-7
/// fixed-point integers so it can be hashed and compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    lat_e7: i64,
    lng_e7: i64,
}

#[inline]
fn scale_e7(value: f64) -> i64 {
    (value * 10f64.powi(KEY_PRECISION as i32)).round() as i64
}

/// Set of rounded coordinate keys (the "seen" set).
pub type KeySet = ahash::AHashSet<Key>;
