//! halfway-io: Browser I/O for the halfway search core.
//!
//! Hosts the offload dispatcher (inline vs. web-worker execution of
//! the combination scan) and the session cache that fetches
//! precomputed grid cells over HTTP. All geodesic logic lives in
//! `halfway-geo`; this crate only moves its inputs and outputs across
//! the browser boundary.

pub mod dispatcher;
pub mod grid_cache;

pub use dispatcher::{
    DispatchError, ProgressFn, Route, SearchWorker, WORKER_THRESHOLD, coverage_heatmap,
    should_offload,
};
pub use grid_cache::GridCache;
