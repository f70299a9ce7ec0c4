//! End-to-end scenarios across the search core: scan kernels, grid
//! index, and heatmap working together on realistic point sets.

#![allow(clippy::unwrap_used)]

use halfway_geo::grid::{self, GridConfig, PairIndex};
use halfway_geo::heatmap::{self, HeatmapConfig};
use halfway_geo::kernel;
use halfway_geo::scan::{BatchKernel, ChunkedKernel, ScanKernel};
use halfway_geo::search;
use halfway_geo::types::LatLng;

/// Small deterministic LCG so the parity scenario needs no external
/// randomness dependency.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        #[allow(clippy::cast_precision_loss)]
        let unit = (self.0 >> 11) as f64 / (1_u64 << 53) as f64;
        unit
    }

    fn point(&mut self) -> LatLng {
        // Stay away from the poles; candidate locations are places,
        // not research stations.
        let lat = self.next_f64().mul_add(160.0, -80.0);
        let lng = self.next_f64().mul_add(360.0, -180.0);
        LatLng::new(lat, lng)
    }
}

#[test]
fn single_pair_midpoint_hits_target_exactly() {
    let points_a = [LatLng::new(0.0, 0.0)];
    let points_b = [LatLng::new(0.0, 10.0)];
    let target = LatLng::new(0.0, 5.0);

    let results = search::find_best_combinations(&points_a, &points_b, target, 10);
    assert_eq!(results.len(), 1);
    assert!(results[0].score < 1e-6, "score {}", results[0].score);
    assert!((results[0].midpoint.lat).abs() < 1e-9);
    assert!((results[0].midpoint.lng - 5.0).abs() < 1e-9);
}

#[test]
fn batch_and_chunked_routes_agree_on_top_50() {
    // The inline route scores with the batch kernel; the delegated
    // route may fall back to the chunked kernel. Both must produce the
    // same top-50: same pairs, same scores.
    let mut rng = Lcg(0x5eed);
    let points_a: Vec<LatLng> = (0..100).map(|_| rng.point()).collect();
    let points_b: Vec<LatLng> = (0..100).map(|_| rng.point()).collect();
    let target = LatLng::new(20.0, -40.0);

    let batch = BatchKernel.find_best(&points_a, &points_b, target, 50, &mut |_| {});
    let chunked = ChunkedKernel.find_best(&points_a, &points_b, target, 50, &mut |_| {});

    assert_eq!(batch.len(), 50);
    assert_eq!(chunked.len(), 50);
    for (b, c) in batch.iter().zip(&chunked) {
        assert_eq!((b.index_a, b.index_b), (c.index_a, c.index_b));
        assert!((b.score - c.score).abs() < 1e-12);
    }
}

#[test]
fn grid_query_matches_live_scan_for_seeded_target() {
    // European capitals; the index stores unordered pairs of one set.
    let cities = [
        LatLng::new(52.52, 13.405),   // Berlin
        LatLng::new(48.8566, 2.3522), // Paris
        LatLng::new(51.5074, -0.1278), // London
        LatLng::new(41.9028, 12.4964), // Rome
        LatLng::new(40.4168, -3.7038), // Madrid
        LatLng::new(52.2297, 21.0122), // Warsaw
    ];
    let config = GridConfig::default();
    let index = PairIndex::build(&cities, &config);

    // Target exactly at the Berlin/Paris midpoint.
    let target = kernel::midpoint(cities[0], cities[1]);
    let results = grid::query_nearest(&mut &index, target, 3, &config).unwrap();

    assert_eq!((results[0].index_a, results[0].index_b), (0, 1));
    // Stored midpoints are rounded to 4 decimal degrees (~11 m worst
    // case per axis).
    assert!(results[0].score < 0.02, "score {}", results[0].score);
}

#[test]
fn heatmap_over_full_enumeration_is_idempotent() {
    let points_a = [
        LatLng::new(52.52, 13.405),
        LatLng::new(48.8566, 2.3522),
        LatLng::new(41.9028, 12.4964),
    ];
    let points_b = [
        LatLng::new(40.4168, -3.7038),
        LatLng::new(52.2297, 21.0122),
        LatLng::new(51.5074, -0.1278),
    ];

    let midpoints = search::all_midpoints(&points_a, &points_b);
    assert_eq!(midpoints.len(), 9);

    let config = HeatmapConfig::default();
    let first = heatmap::generate(&midpoints, &config);
    let second = heatmap::generate(&midpoints, &config);
    assert_eq!(first, second);
    assert!(!first.truncated);
    // Every seed cell is covered.
    let grid = config.grid();
    for mid in &midpoints {
        let key = halfway_geo::CellKey::for_position(*mid, &grid);
        assert_eq!(
            first.cells.get(&key).unwrap().band,
            halfway_geo::Band::Covered,
        );
    }
}
