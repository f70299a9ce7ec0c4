//! Scoring-loop strategies for the exhaustive combination scan.
//!
//! Two interchangeable kernels sit behind [`ScanKernel`]:
//!
//! - [`BatchKernel`] materializes every pair score in one flat buffer
//!   and partial-sorts it (`select_nth_unstable_by`). Fastest, but its
//!   working set is O(n·m). Emits no progress.
//! - [`ChunkedKernel`] streams pairs through a bounded max-heap of
//!   size `top_n` (O(top_n) memory) and reports progress roughly every
//!   1% of pairs.
//!
//! [`KernelKind::probe`] picks one of the two once, at worker
//! initialization; callers of the scoring loop never know which
//! implementation serviced them. Both kernels produce bit-identical
//! results: ascending score, ties broken by row-major encounter order
//! of `(i, j)`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::kernel;
use crate::types::{Combination, LatLng};

/// Pair count the batch working buffer must be able to hold for the
/// fast kernel to be considered available (1M pairs, ~40 MB).
const PROBE_PAIRS: usize = 1 << 20;

/// A strategy for the O(n·m) scoring loop.
///
/// `on_progress` receives percentages in `[0, 100]`, nondecreasing;
/// implementations may call it never (fast path) or roughly once per
/// percent of work (fallback path).
pub trait ScanKernel {
    /// Score every `(i, j)` pairing and return the `top_n` lowest
    /// scores, ascending, ties in row-major encounter order.
    fn find_best(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        target: LatLng,
        top_n: usize,
        on_progress: &mut dyn FnMut(u8),
    ) -> Vec<Combination>;

    /// Enumerate every pair midpoint in row-major order.
    fn all_midpoints(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        on_progress: &mut dyn FnMut(u8),
    ) -> Vec<LatLng>;
}

/// Compare by score, then by encounter order. `(i, j)` pairs are
/// unique, so this is a total order and equal scores keep first-seen
/// ranking.
fn combo_cmp(a: &Combination, b: &Combination) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| a.index_a.cmp(&b.index_a))
        .then_with(|| a.index_b.cmp(&b.index_b))
}

/// Completed-pair percentage, computed in 64 bits: on 32-bit targets
/// `done * 100` overflows `usize` once a scan passes ~43M pairs, and
/// the worker routinely scans more.
fn percent_done(done: usize, total: usize) -> u8 {
    let percent = (done as u64).saturating_mul(100) / (total as u64).max(1);
    #[allow(clippy::cast_possible_truncation)]
    let percent = percent.min(100) as u8;
    percent
}

/// Score one pairing.
#[inline]
fn score_pair(i: usize, j: usize, a: LatLng, b: LatLng, target: LatLng) -> Combination {
    let midpoint = kernel::midpoint(a, b);
    Combination {
        index_a: u32::try_from(i).unwrap_or(u32::MAX),
        index_b: u32::try_from(j).unwrap_or(u32::MAX),
        score: kernel::distance(midpoint, target),
        midpoint,
    }
}

/// Flat-buffer scan with partial sort. The fast path.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchKernel;

impl ScanKernel for BatchKernel {
    fn find_best(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        target: LatLng,
        top_n: usize,
        _on_progress: &mut dyn FnMut(u8),
    ) -> Vec<Combination> {
        let total = points_a.len().saturating_mul(points_b.len());
        if total == 0 || top_n == 0 {
            return Vec::new();
        }

        let mut scored: Vec<Combination> = Vec::with_capacity(total);
        for (i, &a) in points_a.iter().enumerate() {
            for (j, &b) in points_b.iter().enumerate() {
                scored.push(score_pair(i, j, a, b, target));
            }
        }

        let keep = top_n.min(scored.len());
        // Partition the best `keep` to the front, then order just those.
        scored.select_nth_unstable_by(keep - 1, combo_cmp);
        scored.truncate(keep);
        scored.sort_unstable_by(combo_cmp);
        scored
    }

    fn all_midpoints(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        _on_progress: &mut dyn FnMut(u8),
    ) -> Vec<LatLng> {
        let mut midpoints = Vec::with_capacity(points_a.len().saturating_mul(points_b.len()));
        for &a in points_a {
            for &b in points_b {
                midpoints.push(kernel::midpoint(a, b));
            }
        }
        midpoints
    }
}

/// Heap entry ordered so the heap's maximum is the current worst
/// retained combination: higher score is greater, and among equal
/// scores the *later* encounter is greater (evicted first), which
/// preserves first-seen-wins tie ranking.
struct Worst(Combination);

impl PartialEq for Worst {
    fn eq(&self, other: &Self) -> bool {
        combo_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Worst {}

impl PartialOrd for Worst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Worst {
    fn cmp(&self, other: &Self) -> Ordering {
        combo_cmp(&self.0, &other.0)
    }
}

/// Bounded-heap streaming scan with ~1% progress granularity. The
/// fallback path when the batch working buffer is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedKernel;

impl ScanKernel for ChunkedKernel {
    fn find_best(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        target: LatLng,
        top_n: usize,
        on_progress: &mut dyn FnMut(u8),
    ) -> Vec<Combination> {
        let total = points_a.len().saturating_mul(points_b.len());
        if total == 0 || top_n == 0 {
            return Vec::new();
        }

        let step = (total / 100).max(1);
        let mut done = 0_usize;
        let mut heap: BinaryHeap<Worst> = BinaryHeap::with_capacity(top_n.min(total) + 1);

        for (i, &a) in points_a.iter().enumerate() {
            for (j, &b) in points_b.iter().enumerate() {
                let combo = score_pair(i, j, a, b, target);
                if heap.len() < top_n {
                    heap.push(Worst(combo));
                } else if let Some(worst) = heap.peek()
                    && combo_cmp(&combo, &worst.0) == Ordering::Less
                {
                    heap.pop();
                    heap.push(Worst(combo));
                }

                done += 1;
                if done % step == 0 {
                    on_progress(percent_done(done, total));
                }
            }
        }

        let mut results: Vec<Combination> = heap.into_iter().map(|w| w.0).collect();
        results.sort_unstable_by(combo_cmp);
        results
    }

    fn all_midpoints(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        on_progress: &mut dyn FnMut(u8),
    ) -> Vec<LatLng> {
        let total = points_a.len().saturating_mul(points_b.len());
        let step = (total / 100).max(1);
        let mut done = 0_usize;

        let mut midpoints = Vec::with_capacity(total);
        for &a in points_a {
            for &b in points_b {
                midpoints.push(kernel::midpoint(a, b));
                done += 1;
                if done % step == 0 {
                    on_progress(percent_done(done, total));
                }
            }
        }
        midpoints
    }
}

/// Which scoring kernel services requests, decided once per worker
/// session by [`probe`](Self::probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// Flat-buffer batch scan (the fast path).
    Batch,
    /// Bounded-heap streaming scan with progress events.
    Chunked,
}

impl KernelKind {
    /// Capability probe: the batch kernel needs its O(n·m) working
    /// buffer, so ask the allocator for the probe capacity once. On
    /// failure, fall back to the chunked kernel for the session.
    #[must_use]
    pub fn probe() -> Self {
        let mut canary: Vec<Combination> = Vec::new();
        if canary.try_reserve_exact(PROBE_PAIRS).is_ok() {
            Self::Batch
        } else {
            Self::Chunked
        }
    }

    /// The kernel implementation for this kind.
    #[must_use]
    pub fn kernel(self) -> &'static dyn ScanKernel {
        match self {
            Self::Batch => &BatchKernel,
            Self::Chunked => &ChunkedKernel,
        }
    }

    /// Whether this is the fast (batch) path, reported in the worker's
    /// ready handshake as `usedFastKernel`.
    #[must_use]
    pub const fn is_fast(self) -> bool {
        matches!(self, Self::Batch)
    }
}
