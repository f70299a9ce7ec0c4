//! Public combination-search surface.
//!
//! Wraps the pluggable scan kernels behind plain functions for the
//! inline (non-delegated) path: score every pairing of two point sets
//! by the geodesic distance from the pair's midpoint to a target, and
//! keep the best `top_n`.
//!
//! Scores are not monotonic in any single-point distance, so there is
//! no spatial pruning here — cutting the O(n·m) scan short is the job
//! of the precomputed pair index in [`crate::grid`].

use crate::scan::{BatchKernel, ScanKernel};
use crate::types::{Combination, LatLng};

/// Default number of best-scoring combinations a search retains, used
/// by the wire protocol when a request does not specify `topN`.
pub const DEFAULT_TOP_N: usize = 10;

/// Number of pairings a search over `n`×`m` points evaluates.
///
/// Exposed so callers can decide between the inline and delegated
/// execution routes before committing to the scan.
#[must_use]
pub const fn combination_count(n: usize, m: usize) -> usize {
    n.saturating_mul(m)
}

/// Find the `top_n` pairings whose geodesic midpoint lies closest to
/// `target`.
///
/// Results are ascending by score; equal scores keep the row-major
/// `(i, j)` encounter order. Empty inputs or `top_n == 0` produce an
/// empty result (not an error); `top_n > n·m` returns all pairings,
/// sorted. Never mutates the inputs.
#[must_use]
pub fn find_best_combinations(
    points_a: &[LatLng],
    points_b: &[LatLng],
    target: LatLng,
    top_n: usize,
) -> Vec<Combination> {
    BatchKernel.find_best(points_a, points_b, target, top_n, &mut |_| {})
}

/// Enumerate the geodesic midpoint of every pairing, in row-major
/// order. This is the seed input for the coverage heatmap.
#[must_use]
pub fn all_midpoints(points_a: &[LatLng], points_b: &[LatLng]) -> Vec<LatLng> {
    BatchKernel.all_midpoints(points_a, points_b, &mut |_| {})
}
