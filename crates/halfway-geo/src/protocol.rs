//! Wire protocol between the dispatcher and the search worker.
//!
//! Messages cross the `postMessage` boundary as JSON strings, shaped
//! as tagged objects (`{"type": "...", ...}`). Both ends match these
//! enums exhaustively, so an unhandled message kind is a compile
//! error, not a silently dropped frame.
//!
//! Per-request lifecycle: one request with a fresh `id`, zero or more
//! `progress` frames with nondecreasing `percent`, then exactly one
//! terminal frame (`result` or `error`) for that `id`. Nothing follows
//! the terminal frame.

use serde::{Deserialize, Serialize};

use crate::types::{Combination, LatLng};

/// Requests sent from the dispatcher to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    /// One-time handshake; the worker probes its scoring kernel and
    /// replies with [`WorkerResponse::Ready`].
    #[serde(rename = "init")]
    Init,

    /// Score all pairings and return the best `top_n`.
    #[serde(rename = "findBestCombinations", rename_all = "camelCase")]
    FindBestCombinations {
        /// Request correlation id, unique per session.
        id: u64,
        points_a: Vec<LatLng>,
        points_b: Vec<LatLng>,
        target_lat: f64,
        target_lon: f64,
        #[serde(default = "default_top_n")]
        top_n: usize,
    },

    /// Enumerate every pair midpoint (heatmap seeding).
    #[serde(rename = "calculateAllMidpoints", rename_all = "camelCase")]
    CalculateAllMidpoints {
        id: u64,
        points_a: Vec<LatLng>,
        points_b: Vec<LatLng>,
    },
}

fn default_top_n() -> usize {
    crate::search::DEFAULT_TOP_N
}

/// Responses sent from the worker back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    /// Init handshake reply.
    #[serde(rename = "ready", rename_all = "camelCase")]
    Ready {
        /// Whether the probed fast (batch) kernel services this
        /// session's scoring loops.
        used_fast_kernel: bool,
    },

    /// In-flight progress for the request `id`, percent in `[0, 100]`.
    #[serde(rename = "progress")]
    Progress { id: u64, percent: u8 },

    /// Terminal success frame for the request `id`.
    #[serde(rename = "result")]
    Result { id: u64, data: ResultData },

    /// Terminal failure frame for the request `id`. Other in-flight
    /// requests are unaffected.
    #[serde(rename = "error")]
    Error { id: u64, message: String },
}

/// Payload of a terminal `result` frame. The two request kinds have
/// disjoint field sets, so the payload is matched untagged; callers
/// correlate the expected shape by request `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultData {
    /// Reply to `findBestCombinations`.
    Search(SearchOutcome),
    /// Reply to `calculateAllMidpoints`.
    Midpoints(MidpointsOutcome),
}

/// Ranked results plus scan metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Top-N combinations, ascending by score.
    pub results: Vec<Combination>,
    /// Total pairings evaluated (n·m).
    pub total_combinations: usize,
    /// Wall-clock scan duration in milliseconds.
    pub elapsed_ms: f64,
}

/// Full midpoint enumeration plus scan metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidpointsOutcome {
    /// One midpoint per pairing, row-major order.
    pub midpoints: Vec<LatLng>,
    /// Wall-clock scan duration in milliseconds.
    pub elapsed_ms: f64,
}
