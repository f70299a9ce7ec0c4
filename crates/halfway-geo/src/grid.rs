//! Precomputed pair index over a fixed global degree grid.
//!
//! For large, static point sets the O(n·m) scan is done once, offline:
//! every unordered pair's midpoint is computed and bucketed into a
//! degree-grid cell keyed from the global origin (-90, -180). At query
//! time only the cells near the target are loaded, through the
//! [`CellSource`] seam — the core never does I/O itself; the browser
//! fetches cell files over HTTP and the offline builder reads them
//! from disk.
//!
//! Queries expand outward through a fixed ladder of physical radii,
//! stopping as soon as enough candidates have accumulated, then score
//! and rank candidates with the same determinism rules as the live
//! scan (ascending score, ties by `(indexA, indexB)`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel;
use crate::types::{Combination, LatLng};

/// Kilometers per degree of latitude (and of longitude at the
/// equator) on the 6371 km sphere, as used by the cell geometry.
pub const KM_PER_DEG: f64 = 111.0;

/// Widening physical search radii for [`query_nearest`], in km. The
/// last rung covers half the Earth's circumference, i.e. everything.
pub const RADIUS_LADDER_KM: [f64; 6] = [500.0, 1000.0, 2000.0, 5000.0, 10_000.0, 20_000.0];

/// Degree-grid parameters for the pair index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Cell edge length in degrees.
    pub cell_size_deg: f64,
}

impl GridConfig {
    /// Default cell edge length in degrees.
    pub const DEFAULT_CELL_SIZE_DEG: f64 = 5.0;

    /// Number of latitude buckets covering `[-90, 90]`.
    #[must_use]
    pub fn lat_buckets(&self) -> i32 {
        #[allow(clippy::cast_possible_truncation)]
        let n = (180.0 / self.cell_size_deg).ceil() as i32;
        n.max(1)
    }

    /// Number of longitude buckets around the globe. Bucket indices
    /// wrap modulo this, so there is no gap at the ±180° seam.
    #[must_use]
    pub fn lng_buckets(&self) -> i32 {
        #[allow(clippy::cast_possible_truncation)]
        let n = (360.0 / self.cell_size_deg).round() as i32;
        n.max(1)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: Self::DEFAULT_CELL_SIZE_DEG,
        }
    }
}

/// A degree-grid cell, keyed from the fixed global origin (-90, -180).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// `floor((lat + 90) / cell_size)`.
    pub lat_bucket: i32,
    /// `floor((lng + 180) / cell_size)`, wrapped modulo the bucket
    /// count around the globe.
    pub lng_bucket: i32,
}

impl CellKey {
    /// The cell containing `position`.
    #[must_use]
    pub fn for_position(position: LatLng, config: &GridConfig) -> Self {
        let cell = config.cell_size_deg;
        #[allow(clippy::cast_possible_truncation)]
        let lat_bucket = ((position.lat + 90.0) / cell).floor() as i32;
        #[allow(clippy::cast_possible_truncation)]
        let lng_bucket = ((position.lng + 180.0) / cell).floor() as i32;
        Self {
            lat_bucket: lat_bucket.clamp(0, config.lat_buckets() - 1),
            lng_bucket: lng_bucket.rem_euclid(config.lng_buckets()),
        }
    }

    /// Parse the `"{latBucket}_{lngBucket}"` string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (lat, lng) = s.split_once('_')?;
        Some(Self {
            lat_bucket: lat.parse().ok()?,
            lng_bucket: lng.parse().ok()?,
        })
    }

    /// Geographic center of the cell.
    #[must_use]
    pub fn center(&self, config: &GridConfig) -> LatLng {
        let cell = config.cell_size_deg;
        LatLng::new(
            (f64::from(self.lat_bucket) + 0.5).mul_add(cell, -90.0),
            (f64::from(self.lng_bucket) + 0.5).mul_add(cell, -180.0),
        )
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lat_bucket, self.lng_bucket)
    }
}

/// One precomputed pair, as stored in a cell file:
/// `[indexA, indexB, midLat, midLng, distKm]`. Midpoint coordinates
/// are rounded to 4 decimal degrees, the pair distance to whole km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairRecord(pub u32, pub u32, pub f64, pub f64, pub u32);

impl PairRecord {
    /// The stored (rounded) midpoint.
    #[must_use]
    pub const fn midpoint(&self) -> LatLng {
        LatLng::new(self.2, self.3)
    }
}

/// Round to 4 decimal degrees (~11 m), the storage precision of
/// midpoint coordinates.
fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Errors from loading precomputed cell data.
///
/// "Cell not present" is not an error — [`CellSource::load`] returns
/// `Ok(None)` for that — so an `Err` always means a real load or
/// decode failure that should propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The backing store failed to produce the cell.
    #[error("failed to load cell {key}: {message}")]
    Load { key: String, message: String },

    /// The cell file existed but could not be decoded.
    #[error("malformed cell {key}: {message}")]
    Decode { key: String, message: String },
}

/// Source of precomputed cell contents, implemented by the browser
/// fetch cache and by file/in-memory readers in the offline tools.
pub trait CellSource {
    /// Load one cell's pair records. `Ok(None)` means the cell has no
    /// precomputed pairs (a valid empty answer, not a failure).
    fn load(&mut self, key: CellKey) -> Result<Option<Vec<PairRecord>>, GridError>;
}

/// The full offline-built index: every unordered pair of one point
/// set, bucketed by midpoint cell. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PairIndex {
    config: GridConfig,
    cells: HashMap<CellKey, Vec<PairRecord>>,
    total_pairs: usize,
}

impl PairIndex {
    /// Compute midpoint and distance for every unordered pair
    /// `(i < j)` and bucket the records by midpoint cell.
    #[must_use]
    pub fn build(points: &[LatLng], config: &GridConfig) -> Self {
        let mut cells: HashMap<CellKey, Vec<PairRecord>> = HashMap::new();
        let mut total_pairs = 0_usize;

        for (i, &a) in points.iter().enumerate() {
            for (j, &b) in points.iter().enumerate().skip(i + 1) {
                let mid = kernel::midpoint(a, b);
                let dist_km = kernel::distance(a, b);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let record = PairRecord(
                    u32::try_from(i).unwrap_or(u32::MAX),
                    u32::try_from(j).unwrap_or(u32::MAX),
                    round4(mid.lat),
                    round4(mid.lng),
                    dist_km.round().max(0.0) as u32,
                );
                cells
                    .entry(CellKey::for_position(mid, config))
                    .or_default()
                    .push(record);
                total_pairs += 1;
            }
        }

        Self {
            config: *config,
            cells,
            total_pairs,
        }
    }

    /// Total number of unordered pairs indexed.
    #[must_use]
    pub const fn total_pairs(&self) -> usize {
        self.total_pairs
    }

    /// All nonempty cells and their records.
    #[must_use]
    pub const fn cells(&self) -> &HashMap<CellKey, Vec<PairRecord>> {
        &self.cells
    }

    /// Per-cell record counts keyed by the `"{lat}_{lng}"` string
    /// form, ordered for stable file output.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.cells
            .iter()
            .map(|(key, records)| (key.to_string(), records.len()))
            .collect()
    }

    /// The grid parameters the index was built with.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }
}

/// In-memory [`CellSource`] over a built [`PairIndex`]. The offline
/// tools and tests query through this; the browser path streams cells
/// from files instead.
impl CellSource for &PairIndex {
    fn load(&mut self, key: CellKey) -> Result<Option<Vec<PairRecord>>, GridError> {
        Ok(self.cells.get(&key).cloned())
    }
}

/// Enumerate the cells whose contents can lie within `radius_km` of
/// `target`, in deterministic order (latitude rows ascending, then
/// longitudes eastward from the western edge of the span).
///
/// Longitude spans widen by `1 / cos(lat)` per row and wrap modulo the
/// bucket count, so a query near the ±180° seam or at high latitude
/// sees every relevant cell exactly once.
#[must_use]
pub fn cells_within_radius(target: LatLng, radius_km: f64, config: &GridConfig) -> Vec<CellKey> {
    let cell = config.cell_size_deg;
    let lat_total = config.lat_buckets();
    let lng_total = config.lng_buckets();

    let dlat_deg = radius_km / KM_PER_DEG;
    #[allow(clippy::cast_possible_truncation)]
    let lat_min = (((target.lat - dlat_deg).max(-90.0) + 90.0) / cell).floor() as i32;
    #[allow(clippy::cast_possible_truncation)]
    let lat_max = (((target.lat + dlat_deg).min(90.0) + 90.0) / cell).floor() as i32;
    let lat_min = lat_min.clamp(0, lat_total - 1);
    let lat_max = lat_max.clamp(0, lat_total - 1);

    #[allow(clippy::cast_possible_truncation)]
    let center_lng = ((target.lng + 180.0) / cell).floor() as i32;

    let mut keys = Vec::new();
    for lat_bucket in lat_min..=lat_max {
        let row_lat = (f64::from(lat_bucket) + 0.5).mul_add(cell, -90.0);
        let cos_lat = row_lat.to_radians().cos().abs();

        // Longitude half-span in buckets for this row; near the poles
        // (or for globe-scale radii) the whole row qualifies.
        let full_row = if cos_lat < 1e-9 {
            true
        } else {
            let dlng_deg = radius_km / (KM_PER_DEG * cos_lat);
            #[allow(clippy::cast_possible_truncation)]
            let half_span = (dlng_deg / cell).ceil() as i64;
            2 * half_span + 1 >= i64::from(lng_total)
        };

        if full_row {
            for lng_bucket in 0..lng_total {
                keys.push(CellKey {
                    lat_bucket,
                    lng_bucket,
                });
            }
        } else {
            let dlng_deg = radius_km / (KM_PER_DEG * cos_lat);
            #[allow(clippy::cast_possible_truncation)]
            let half_span = (dlng_deg / cell).ceil() as i32;
            for offset in -half_span..=half_span {
                keys.push(CellKey {
                    lat_bucket,
                    lng_bucket: (center_lng + offset).rem_euclid(lng_total),
                });
            }
        }
    }
    keys
}

/// Score and rank loaded candidates exactly like the live scan:
/// ascending by distance from the stored midpoint to `target`, ties by
/// `(indexA, indexB)`, truncated to `budget`.
#[must_use]
pub fn rank_candidates(
    candidates: &[PairRecord],
    target: LatLng,
    budget: usize,
) -> Vec<Combination> {
    let mut ranked: Vec<Combination> = candidates
        .iter()
        .map(|r| {
            let midpoint = r.midpoint();
            Combination {
                index_a: r.0,
                index_b: r.1,
                score: kernel::distance(midpoint, target),
                midpoint,
            }
        })
        .collect();
    ranked.sort_unstable_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.index_a.cmp(&b.index_a))
            .then_with(|| a.index_b.cmp(&b.index_b))
    });
    ranked.truncate(budget);
    ranked
}

/// Query the precomputed index: expand outward from the target's cell
/// through [`RADIUS_LADDER_KM`], loading each candidate cell at most
/// once, and stop widening as soon as `budget` candidates have
/// accumulated. An empty result is a valid answer; only load/decode
/// failures are errors.
///
/// # Errors
///
/// Propagates the first [`GridError`] from the cell source.
pub fn query_nearest<S: CellSource>(
    source: &mut S,
    target: LatLng,
    budget: usize,
    config: &GridConfig,
) -> Result<Vec<Combination>, GridError> {
    if budget == 0 {
        return Ok(Vec::new());
    }

    let mut visited: HashSet<CellKey> = HashSet::new();
    let mut candidates: Vec<PairRecord> = Vec::new();

    for radius_km in RADIUS_LADDER_KM {
        for key in cells_within_radius(target, radius_km, config) {
            if visited.insert(key)
                && let Some(records) = source.load(key)?
            {
                candidates.extend(records);
            }
        }
        if candidates.len() >= budget {
            break;
        }
    }

    Ok(rank_candidates(&candidates, target, budget))
}
