//! Coverage heatmap: classify the global grid by geodesic distance to
//! the nearest pair midpoint.
//!
//! Every cell containing at least one midpoint from the full n·m
//! enumeration is seeded at distance zero, then a multi-source
//! flood-fill expands outward over the 8-connected grid graph using
//! true physical center-to-center step distances (vertical steps are
//! constant, horizontal steps shrink with `cos(lat)`).
//!
//! The frontier is a FIFO queue, not a priority queue. Edge weights
//! differ by direction and latitude, so this is a deliberate
//! approximation of Dijkstra: a cell reached by two paths of similar
//! length may keep the slightly longer label if the longer path was
//! queued first and no improvement follows. At the band granularity
//! used for rendering the difference is confined to band boundaries.
//! Keep the FIFO behavior; switching to a priority queue changes
//! output at cell edges.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::grid::{CellKey, GridConfig, KM_PER_DEG};
use crate::types::LatLng;

/// Parameters for heatmap generation. Defaults give ~100 km cells at
/// the equator and the 100/250/400 km color bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Cell edge length in degrees.
    pub cell_size_deg: f64,
    /// Upper bound (exclusive) of the innermost non-covered band, km.
    pub band_near_km: f64,
    /// Upper bound (exclusive) of the middle band, km.
    pub band_mid_km: f64,
    /// Hard expansion cutoff (exclusive), km; also the outer band edge.
    pub cutoff_km: f64,
    /// Safety cap on total labeled cells; expansion halts early (with
    /// a reported truncation) rather than failing when exceeded.
    pub max_cells: usize,
}

impl HeatmapConfig {
    /// Default cell edge: 100 km at the equator.
    pub const DEFAULT_CELL_SIZE_DEG: f64 = 100.0 / 111.0;
    /// Default inner band edge in km.
    pub const DEFAULT_BAND_NEAR_KM: f64 = 100.0;
    /// Default middle band edge in km.
    pub const DEFAULT_BAND_MID_KM: f64 = 250.0;
    /// Default expansion cutoff in km.
    pub const DEFAULT_CUTOFF_KM: f64 = 400.0;
    /// Default labeled-cell cap.
    pub const DEFAULT_MAX_CELLS: usize = 500_000;

    /// The degree-grid parameters implied by this config.
    #[must_use]
    pub const fn grid(&self) -> GridConfig {
        GridConfig {
            cell_size_deg: self.cell_size_deg,
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: Self::DEFAULT_CELL_SIZE_DEG,
            band_near_km: Self::DEFAULT_BAND_NEAR_KM,
            band_mid_km: Self::DEFAULT_BAND_MID_KM,
            cutoff_km: Self::DEFAULT_CUTOFF_KM,
            max_cells: Self::DEFAULT_MAX_CELLS,
        }
    }
}

/// Color band of one heatmap cell, by distance to the nearest midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    /// Contains a midpoint (distance zero).
    Covered,
    /// Below the inner band edge (default < 100 km).
    Near,
    /// Below the middle band edge (default < 250 km).
    Mid,
    /// Below the cutoff (default < 400 km).
    Far,
}

/// Label assigned to one cell: its band and the cumulative distance
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLabel {
    pub band: Band,
    pub distance_km: f64,
}

/// The generated heatmap: one label per reachable cell, plus whether
/// the safety cap cut the expansion short (a partial result, not a
/// failure).
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub cells: HashMap<CellKey, CellLabel>,
    pub truncated: bool,
}

/// 8-connected neighborhood offsets `(d_lat, d_lng)`.
const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Generate the coverage heatmap for a set of midpoints.
///
/// Deterministic for identical input: seeds are queued in first-seen
/// midpoint order and neighbors expand in a fixed order, so repeated
/// runs on the same enumeration yield an identical cell→band mapping.
#[must_use]
pub fn generate(midpoints: &[LatLng], config: &HeatmapConfig) -> Heatmap {
    let grid = config.grid();
    let lat_total = grid.lat_buckets();
    let lng_total = grid.lng_buckets();

    let mut best: HashMap<CellKey, f64> = HashMap::new();
    let mut queue: VecDeque<CellKey> = VecDeque::new();
    let mut truncated = false;

    // Seed every cell containing a midpoint at distance zero, in
    // first-seen order.
    for &mid in midpoints {
        let key = CellKey::for_position(mid, &grid);
        if best.insert(key, 0.0).is_none() {
            queue.push_back(key);
        }
    }

    let lat_step_km = config.cell_size_deg * KM_PER_DEG;

    'fill: while let Some(current) = queue.pop_front() {
        let current_dist = best.get(&current).copied().unwrap_or(0.0);
        let center = current.center(&grid);
        let lng_step_km = lat_step_km * center.lat.to_radians().cos().abs();

        for (d_lat, d_lng) in NEIGHBORS {
            let lat_bucket = current.lat_bucket + d_lat;
            if lat_bucket < 0 || lat_bucket >= lat_total {
                continue;
            }
            let neighbor = CellKey {
                lat_bucket,
                lng_bucket: (current.lng_bucket + d_lng).rem_euclid(lng_total),
            };

            let step_km = match (d_lat, d_lng) {
                (0, _) => lng_step_km,
                (_, 0) => lat_step_km,
                _ => lat_step_km.hypot(lng_step_km),
            };
            let tentative = current_dist + step_km;
            if tentative >= config.cutoff_km {
                continue;
            }

            match best.get(&neighbor) {
                // Seeded (covered) cells hold distance 0 and are never
                // overwritten; others only improve.
                Some(&existing) if existing <= tentative => {}
                Some(_) => {
                    best.insert(neighbor, tentative);
                    queue.push_back(neighbor);
                }
                None => {
                    if best.len() >= config.max_cells {
                        truncated = true;
                        break 'fill;
                    }
                    best.insert(neighbor, tentative);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    let cells = best
        .into_iter()
        .map(|(key, distance_km)| {
            let band = if distance_km <= 0.0 {
                Band::Covered
            } else if distance_km < config.band_near_km {
                Band::Near
            } else if distance_km < config.band_mid_km {
                Band::Mid
            } else {
                Band::Far
            };
            (key, CellLabel { band, distance_km })
        })
        .collect();

    Heatmap { cells, truncated }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_map() {
        let map = generate(&[], &HeatmapConfig::default());
        assert!(map.cells.is_empty());
        assert!(!map.truncated);
    }

    #[test]
    fn seed_cells_are_covered_at_zero() {
        let config = HeatmapConfig::default();
        let mids = [LatLng::new(10.0, 10.0), LatLng::new(-20.0, 30.0)];
        let map = generate(&mids, &config);
        for mid in mids {
            let key = CellKey::for_position(mid, &config.grid());
            let label = map.cells.get(&key).unwrap();
            assert_eq!(label.band, Band::Covered);
            assert!(label.distance_km.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn expansion_stays_below_cutoff() {
        let config = HeatmapConfig::default();
        let map = generate(&[LatLng::new(0.0, 0.0)], &config);
        assert!(map.cells.len() > 1, "no expansion happened");
        for label in map.cells.values() {
            assert!(label.distance_km < config.cutoff_km);
        }
    }

    #[test]
    fn bands_partition_by_distance() {
        let config = HeatmapConfig::default();
        let map = generate(&[LatLng::new(0.0, 0.0)], &config);
        for label in map.cells.values() {
            let expected = if label.distance_km <= 0.0 {
                Band::Covered
            } else if label.distance_km < 100.0 {
                Band::Near
            } else if label.distance_km < 250.0 {
                Band::Mid
            } else {
                Band::Far
            };
            assert_eq!(label.band, expected);
        }
        // All four bands appear around an isolated seed.
        for band in [Band::Covered, Band::Near, Band::Mid, Band::Far] {
            assert!(
                map.cells.values().any(|l| l.band == band),
                "missing {band:?}",
            );
        }
    }

    #[test]
    fn adjacent_cell_distance_is_one_step() {
        let config = HeatmapConfig::default();
        let grid = config.grid();
        let seed = LatLng::new(0.0, 0.0);
        let map = generate(&[seed], &config);

        let seed_key = CellKey::for_position(seed, &grid);
        let north = CellKey {
            lat_bucket: seed_key.lat_bucket + 1,
            lng_bucket: seed_key.lng_bucket,
        };
        let label = map.cells.get(&north).unwrap();
        let lat_step = config.cell_size_deg * KM_PER_DEG; // ~100 km
        assert!((label.distance_km - lat_step).abs() < 1e-9);
    }

    #[test]
    fn covered_cells_never_downgraded() {
        let config = HeatmapConfig::default();
        let grid = config.grid();
        // Two adjacent seeds: each stays covered, neither gets the
        // other's one-step distance.
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(config.cell_size_deg, 0.0);
        let map = generate(&[a, b], &config);
        for seed in [a, b] {
            let label = map.cells.get(&CellKey::for_position(seed, &grid)).unwrap();
            assert_eq!(label.band, Band::Covered);
        }
    }

    #[test]
    fn idempotent_for_same_input() {
        let config = HeatmapConfig::default();
        let mids = [
            LatLng::new(10.0, 10.0),
            LatLng::new(10.5, 10.5),
            LatLng::new(-30.0, 100.0),
            LatLng::new(60.0, -120.0),
        ];
        let first = generate(&mids, &config);
        let second = generate(&mids, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn truncation_is_reported_not_fatal() {
        let config = HeatmapConfig {
            max_cells: 10,
            ..HeatmapConfig::default()
        };
        let map = generate(&[LatLng::new(0.0, 0.0)], &config);
        assert!(map.truncated);
        assert!(map.cells.len() <= 10);
    }

    #[test]
    fn seam_expansion_wraps_longitude() {
        let config = HeatmapConfig::default();
        let grid = config.grid();
        let seed = LatLng::new(0.0, 179.9);
        let map = generate(&[seed], &config);
        // A cell just across the seam must be labeled.
        let across = CellKey::for_position(LatLng::new(0.0, -179.9), &grid);
        assert!(map.cells.contains_key(&across), "no wrap across the seam");
    }

    #[test]
    fn high_latitude_horizontal_steps_shrink() {
        let config = HeatmapConfig::default();
        let grid = config.grid();
        let equator = generate(&[LatLng::new(0.0, 0.0)], &config);
        let arctic = generate(&[LatLng::new(75.0, 0.0)], &config);

        let row_width = |map: &Heatmap, seed: LatLng| {
            let bucket = CellKey::for_position(seed, &grid).lat_bucket;
            map.cells
                .keys()
                .filter(|k| k.lat_bucket == bucket)
                .count()
        };
        // Cheaper horizontal steps at 75°N let the fill reach more
        // cells along the seed's own row before the cutoff.
        assert!(
            row_width(&arctic, LatLng::new(75.0, 0.0)) > row_width(&equator, LatLng::new(0.0, 0.0)),
        );
    }
}
