//! halfway-geo: Pure geodesic midpoint search core (sans-IO).
//!
//! Given two sets of candidate locations and a target, rank the pairs
//! whose geodesic midpoint lands closest to the target:
//! spherical kernel -> exhaustive pair scan -> top-N ranking, with a
//! precomputed degree-grid pair index for large static datasets and a
//! distance-banded coverage heatmap over the full midpoint set.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! slices and returns structured data. Browser and filesystem
//! interaction (the worker dispatcher, cell fetching, the offline
//! index builder) lives in `halfway-io`, `halfway-worker`, and
//! `halfway-precompute`.

pub mod grid;
pub mod heatmap;
pub mod kernel;
pub mod protocol;
pub mod scan;
pub mod search;
pub mod types;

pub use grid::{CellKey, CellSource, GridConfig, GridError, PairIndex, PairRecord};
pub use heatmap::{Band, Heatmap, HeatmapConfig};
pub use kernel::Reflection;
pub use protocol::{MidpointsOutcome, ResultData, SearchOutcome, WorkerRequest, WorkerResponse};
pub use scan::{KernelKind, ScanKernel};
pub use types::{Combination, GeoPoint, LatLng};
