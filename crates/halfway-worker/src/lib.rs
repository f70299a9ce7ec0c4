//! Web worker entry point for halfway combination scans.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives protocol JSON via `postMessage`, runs the
//! scoring loop from `halfway-geo`, and posts frames back: zero or
//! more `progress` frames, then exactly one terminal `result` or
//! `error` frame per request id.
//!
//! The scoring kernel is probed once, at the `init` handshake: the
//! batch kernel when its working buffer can be reserved, the chunked
//! progress-emitting kernel otherwise. Requests after that are
//! serviced by whichever kernel the probe selected — the dispatcher
//! never depends on the choice beyond the `usedFastKernel` flag in the
//! ready frame.
//!
//! Running the scan in a worker keeps the browser's main thread free
//! for map panning and UI updates while tens of millions of pairings
//! are scored.

use std::cell::Cell;

use halfway_geo::protocol::{
    MidpointsOutcome, ResultData, SearchOutcome, WorkerRequest, WorkerResponse,
};
use halfway_geo::scan::KernelKind;
use halfway_geo::search;
use halfway_geo::types::LatLng;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_time::Instant;

thread_local! {
    /// Kernel selected by the init-time probe. Workers are
    /// single-threaded; one slot per worker instance.
    static KERNEL: Cell<Option<KernelKind>> = const { Cell::new(None) };
}

/// # Worker entry point
///
/// Called automatically when the WASM module is instantiated in the
/// worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    // Get the worker global scope.
    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope");

    // Set up the message handler.
    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // leak — lives for the worker lifetime
}

/// Decode one request frame and service it.
fn handle_message(event: &web_sys::MessageEvent) {
    let Some(json) = event.data().as_string() else {
        web_sys::console::error_1(&JsValue::from_str(
            "halfway worker: non-string frame dropped",
        ));
        return;
    };

    let request: WorkerRequest = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(e) => {
            web_sys::console::error_1(&JsValue::from_str(&format!(
                "halfway worker: undecodable frame dropped: {e}",
            )));
            return;
        }
    };

    match request {
        WorkerRequest::Init => {
            let kind = probed_kernel();
            post_response(&WorkerResponse::Ready {
                used_fast_kernel: kind.is_fast(),
            });
        }
        WorkerRequest::FindBestCombinations {
            id,
            points_a,
            points_b,
            target_lat,
            target_lon,
            top_n,
        } => {
            let target = LatLng::new(target_lat, target_lon);
            run_search(id, &points_a, &points_b, target, top_n);
        }
        WorkerRequest::CalculateAllMidpoints {
            id,
            points_a,
            points_b,
        } => {
            run_midpoints(id, &points_a, &points_b);
        }
    }
}

/// The session kernel, probing on first use if no `init` arrived
/// first.
fn probed_kernel() -> KernelKind {
    KERNEL.with(|slot| {
        slot.get().unwrap_or_else(|| {
            let kind = KernelKind::probe();
            slot.set(Some(kind));
            kind
        })
    })
}

fn run_search(id: u64, points_a: &[LatLng], points_b: &[LatLng], target: LatLng, top_n: usize) {
    let kernel = probed_kernel().kernel();
    let started = Instant::now();

    let mut last_percent = 0_u8;
    let results = kernel.find_best(points_a, points_b, target, top_n, &mut |percent| {
        // The chunked kernel reports ~every 1%; forward each new value.
        if percent > last_percent {
            last_percent = percent;
            post_response(&WorkerResponse::Progress { id, percent });
        }
    });

    post_response(&WorkerResponse::Result {
        id,
        data: ResultData::Search(SearchOutcome {
            results,
            total_combinations: search::combination_count(points_a.len(), points_b.len()),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }),
    });
}

fn run_midpoints(id: u64, points_a: &[LatLng], points_b: &[LatLng]) {
    let kernel = probed_kernel().kernel();
    let started = Instant::now();

    let mut last_percent = 0_u8;
    let midpoints = kernel.all_midpoints(points_a, points_b, &mut |percent| {
        if percent > last_percent {
            last_percent = percent;
            post_response(&WorkerResponse::Progress { id, percent });
        }
    });

    post_response(&WorkerResponse::Result {
        id,
        data: ResultData::Midpoints(MidpointsOutcome {
            midpoints,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }),
    });
}

/// Serialize one response frame and post it to the main thread.
fn post_response(response: &WorkerResponse) {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            // Fall back to a hand-built error frame for the same id so
            // the dispatcher still receives its terminal event.
            let id = match response {
                WorkerResponse::Ready { .. } => 0,
                WorkerResponse::Progress { id, .. }
                | WorkerResponse::Result { id, .. }
                | WorkerResponse::Error { id, .. } => *id,
            };
            format!(
                r#"{{"type":"error","id":{id},"message":"failed to serialize response: {e}"}}"#,
            )
        }
    };

    if let Ok(global) = js_sys::global().dyn_into::<web_sys::DedicatedWorkerGlobalScope>() {
        let _ = global.post_message(&JsValue::from_str(&json));
    }
}
