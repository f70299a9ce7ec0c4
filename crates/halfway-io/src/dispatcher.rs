//! Offload dispatch: route searches inline or to the web worker.
//!
//! [`SearchWorker`] wraps a `web_sys::Worker` running the
//! `halfway-worker` WASM module. Small requests (below
//! [`WORKER_THRESHOLD`] pairings) are computed synchronously on the
//! calling thread with no progress events; larger ones are serialized
//! as protocol JSON, posted to one long-lived worker, and correlated
//! back by request id through a pending-request table.
//!
//! The worker is created from embedded JS + WASM blobs, so no extra
//! static files need to be served, and it is initialized exactly once:
//! concurrent first calls share the single in-flight `init` handshake
//! instead of spawning twice.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use halfway_geo::heatmap::{self, Heatmap, HeatmapConfig};
use halfway_geo::protocol::{
    MidpointsOutcome, ResultData, SearchOutcome, WorkerRequest, WorkerResponse,
};
use halfway_geo::search;
use halfway_geo::types::LatLng;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_time::Instant;

/// Pair count at which a search is delegated to the worker instead of
/// running inline.
pub const WORKER_THRESHOLD: usize = 10_000;

/// Whether an `n`×`m` scan is large enough to delegate.
#[must_use]
pub const fn should_offload(n: usize, m: usize) -> bool {
    n.saturating_mul(m) >= WORKER_THRESHOLD
}

/// Execution route for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Apply the [`should_offload`] threshold.
    Auto,
    /// Force the synchronous in-thread scan.
    Inline,
    /// Force delegation to the worker.
    Delegated,
}

/// Errors surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Worker initialization failed; not retried automatically.
    #[error("worker initialization failed: {0}")]
    Init(String),

    /// A request could not be serialized for the wire.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// `postMessage` to the worker failed.
    #[error("failed to post message to worker: {0}")]
    Post(String),

    /// The worker reported a terminal error for this request. Other
    /// in-flight requests are unaffected.
    #[error("worker request failed: {0}")]
    Request(String),

    /// The worker's reply was missing or had an unexpected shape.
    #[error("malformed worker reply: {0}")]
    Decode(String),
}

/// Progress callback for delegated requests: percent in `[0, 100]`,
/// nondecreasing, always before the terminal resolution.
pub type ProgressFn = Box<dyn FnMut(u8)>;

/// One outstanding delegated request, owned by the pending table until
/// its terminal frame arrives (or the session is terminated).
struct PendingRequest {
    resolve: js_sys::Function,
    reject: js_sys::Function,
    result: Rc<RefCell<Option<ResultData>>>,
}

/// Shared init handshake state.
enum InitState {
    /// No worker yet; the first request creates one.
    Idle,
    /// Handshake posted; every concurrent caller awaits this promise.
    InFlight(js_sys::Promise),
    /// Handshake complete.
    Ready { used_fast_kernel: bool },
    /// Handshake failed; surfaced to all callers, not retried.
    Failed(String),
}

/// A search dispatcher bound to one long-lived worker context.
///
/// Create one at app startup and reuse it for all searches. There is
/// no per-request cancellation; [`terminate`](Self::terminate) ends
/// the whole session and abandons anything in flight.
pub struct SearchWorker {
    /// Embedded wasm_bindgen JS glue for the worker module.
    worker_js: &'static str,
    /// Embedded WASM binary for the worker.
    worker_wasm: &'static [u8],
    /// The live worker, once initialized.
    inner: RefCell<Option<web_sys::Worker>>,
    init: RefCell<InitState>,
    /// Resolve/reject of the in-flight init promise, consumed by the
    /// `ready` frame (or a worker-level error).
    init_waiter: Rc<RefCell<Option<(js_sys::Function, js_sys::Function)>>>,
    /// `usedFastKernel` from the ready handshake.
    ready_fast: Rc<Cell<bool>>,
    /// Monotonically increasing request id counter.
    next_id: Cell<u64>,
    pending: Rc<RefCell<HashMap<u64, PendingRequest>>>,
    /// Progress callbacks for in-flight requests, kept apart from
    /// [`PendingRequest`] so delivery can release every table borrow
    /// before user code runs.
    progress: Rc<RefCell<HashMap<u64, ProgressFn>>>,
    /// Bumped by [`terminate`](Self::terminate); a progress delivery
    /// that straddles a bump drops its callback instead of
    /// resurrecting an abandoned request.
    epoch: Rc<Cell<u64>>,
    /// Long-lived message handlers, kept alive for the worker's life.
    handlers: RefCell<Option<(Closure<dyn FnMut(web_sys::MessageEvent)>, Closure<dyn FnMut(web_sys::ErrorEvent)>)>>,
}

impl SearchWorker {
    /// Create a dispatcher from embedded worker JS and WASM blobs. The
    /// worker itself is not spawned until the first delegated request.
    #[must_use]
    pub fn new(worker_js: &'static str, worker_wasm: &'static [u8]) -> Self {
        Self {
            worker_js,
            worker_wasm,
            inner: RefCell::new(None),
            init: RefCell::new(InitState::Idle),
            init_waiter: Rc::new(RefCell::new(None)),
            ready_fast: Rc::new(Cell::new(false)),
            next_id: Cell::new(0),
            pending: Rc::new(RefCell::new(HashMap::new())),
            progress: Rc::new(RefCell::new(HashMap::new())),
            epoch: Rc::new(Cell::new(0)),
            handlers: RefCell::new(None),
        }
    }

    /// Find the best pairings of two point sets, routing by the
    /// offload threshold.
    ///
    /// `on_progress` is only invoked on the delegated route; the
    /// inline route returns synchronously with no progress events.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if worker init, encoding, posting,
    /// or the delegated scan itself fails.
    #[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
    pub async fn find_best_combinations(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        target: LatLng,
        top_n: usize,
        on_progress: Option<ProgressFn>,
    ) -> Result<SearchOutcome, DispatchError> {
        self.find_best_combinations_routed(points_a, points_b, target, top_n, on_progress, Route::Auto)
            .await
    }

    /// [`find_best_combinations`](Self::find_best_combinations) with
    /// an explicit route, for threshold overrides and route-parity
    /// testing.
    ///
    /// # Errors
    ///
    /// See [`find_best_combinations`](Self::find_best_combinations).
    #[allow(clippy::future_not_send)]
    pub async fn find_best_combinations_routed(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        target: LatLng,
        top_n: usize,
        on_progress: Option<ProgressFn>,
        route: Route,
    ) -> Result<SearchOutcome, DispatchError> {
        if Self::runs_inline(points_a.len(), points_b.len(), route) {
            let started = Instant::now();
            let results = search::find_best_combinations(points_a, points_b, target, top_n);
            return Ok(SearchOutcome {
                results,
                total_combinations: search::combination_count(points_a.len(), points_b.len()),
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            });
        }

        let id = self.allocate_id();
        let request = WorkerRequest::FindBestCombinations {
            id,
            points_a: points_a.to_vec(),
            points_b: points_b.to_vec(),
            target_lat: target.lat,
            target_lon: target.lng,
            top_n,
        };
        match self.delegate(id, &request, on_progress).await? {
            ResultData::Search(outcome) => Ok(outcome),
            ResultData::Midpoints(_) => Err(DispatchError::Decode(
                "midpoints payload for a search request".into(),
            )),
        }
    }

    /// Enumerate every pair midpoint, routing by the offload
    /// threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the delegated enumeration fails.
    #[allow(clippy::future_not_send)]
    pub async fn calculate_all_midpoints(
        &self,
        points_a: &[LatLng],
        points_b: &[LatLng],
        on_progress: Option<ProgressFn>,
    ) -> Result<MidpointsOutcome, DispatchError> {
        if Self::runs_inline(points_a.len(), points_b.len(), Route::Auto) {
            let started = Instant::now();
            return Ok(MidpointsOutcome {
                midpoints: search::all_midpoints(points_a, points_b),
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            });
        }

        let id = self.allocate_id();
        let request = WorkerRequest::CalculateAllMidpoints {
            id,
            points_a: points_a.to_vec(),
            points_b: points_b.to_vec(),
        };
        match self.delegate(id, &request, on_progress).await? {
            ResultData::Midpoints(outcome) => Ok(outcome),
            ResultData::Search(_) => Err(DispatchError::Decode(
                "search payload for a midpoints request".into(),
            )),
        }
    }

    /// Whether the ready handshake reported the fast scoring kernel.
    /// `None` until initialization has completed.
    #[must_use]
    pub fn used_fast_kernel(&self) -> Option<bool> {
        match *self.init.borrow() {
            InitState::Ready { used_fast_kernel } => Some(used_fast_kernel),
            _ => None,
        }
    }

    /// End the session: terminate the worker context and abandon all
    /// pending requests. Abandoned callers never resolve — by
    /// contract, nothing may be awaited across a terminate.
    pub fn terminate(&self) {
        if let Some(worker) = self.inner.borrow_mut().take() {
            worker.terminate();
        }
        self.handlers.borrow_mut().take();
        self.pending.borrow_mut().clear();
        self.progress.borrow_mut().clear();
        self.epoch.set(self.epoch.get() + 1);
        self.init_waiter.borrow_mut().take();
        *self.init.borrow_mut() = InitState::Idle;
    }

    const fn runs_inline(n: usize, m: usize, route: Route) -> bool {
        match route {
            Route::Auto => !should_offload(n, m),
            Route::Inline => true,
            Route::Delegated => false,
        }
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Send one request to the worker and await its terminal frame.
    #[allow(clippy::future_not_send)]
    async fn delegate(
        &self,
        id: u64,
        request: &WorkerRequest,
        on_progress: Option<ProgressFn>,
    ) -> Result<ResultData, DispatchError> {
        self.ensure_init().await?;

        let json = serde_json::to_string(request)
            .map_err(|e| DispatchError::Encode(e.to_string()))?;

        let (promise, resolve, reject) = new_promise();
        let result = Rc::new(RefCell::new(None));
        self.pending.borrow_mut().insert(
            id,
            PendingRequest {
                resolve,
                reject,
                result: Rc::clone(&result),
            },
        );
        if let Some(callback) = on_progress {
            self.progress.borrow_mut().insert(id, callback);
        }

        if let Err(e) = self.post(&json) {
            self.pending.borrow_mut().remove(&id);
            self.progress.borrow_mut().remove(&id);
            return Err(e);
        }

        // Await the terminal frame — this yields to the browser event
        // loop while the worker scans.
        match wasm_bindgen_futures::JsFuture::from(promise).await {
            Ok(_) => result
                .borrow_mut()
                .take()
                .ok_or_else(|| DispatchError::Decode("terminal frame carried no data".into())),
            Err(e) => Err(DispatchError::Request(js_message(&e))),
        }
    }

    /// Await the shared init handshake, starting it if this is the
    /// first caller.
    #[allow(clippy::future_not_send)]
    async fn ensure_init(&self) -> Result<bool, DispatchError> {
        enum Step {
            Done(bool),
            Fail(String),
            Wait(js_sys::Promise),
            Start,
        }

        let step = {
            let state = self.init.borrow();
            match &*state {
                InitState::Ready { used_fast_kernel } => Step::Done(*used_fast_kernel),
                InitState::Failed(message) => Step::Fail(message.clone()),
                InitState::InFlight(promise) => Step::Wait(promise.clone()),
                InitState::Idle => Step::Start,
            }
        };

        let promise = match step {
            Step::Done(fast) => return Ok(fast),
            Step::Fail(message) => return Err(DispatchError::Init(message)),
            Step::Wait(promise) => promise,
            Step::Start => self.start_init()?,
        };

        match wasm_bindgen_futures::JsFuture::from(promise).await {
            Ok(_) => {
                let fast = self.ready_fast.get();
                *self.init.borrow_mut() = InitState::Ready {
                    used_fast_kernel: fast,
                };
                Ok(fast)
            }
            Err(e) => {
                let message = js_message(&e);
                *self.init.borrow_mut() = InitState::Failed(message.clone());
                Err(DispatchError::Init(message))
            }
        }
    }

    /// Spawn the worker, install the session-long message handlers,
    /// and post the init handshake.
    fn start_init(&self) -> Result<js_sys::Promise, DispatchError> {
        let worker = create_worker(self.worker_js, self.worker_wasm);

        let pending = Rc::clone(&self.pending);
        let progress = Rc::clone(&self.progress);
        let epoch = Rc::clone(&self.epoch);
        let init_waiter = Rc::clone(&self.init_waiter);
        let ready_fast = Rc::clone(&self.ready_fast);
        let onmessage = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                route_response(&event, &pending, &progress, &epoch, &init_waiter, &ready_fast);
            },
        );

        let init_waiter = Rc::clone(&self.init_waiter);
        let onerror =
            Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(move |event: web_sys::ErrorEvent| {
                // A worker-level error before the handshake fails init;
                // afterwards it is logged — per-request failures travel
                // as protocol error frames instead.
                if let Some((_, reject)) = init_waiter.borrow_mut().take() {
                    reject.call1(&JsValue::NULL, &JsValue::from_str(&event.message())).ok();
                } else {
                    web_sys::console::warn_1(&JsValue::from_str(&format!(
                        "halfway worker error: {}",
                        event.message(),
                    )));
                }
            });

        worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        worker.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        *self.handlers.borrow_mut() = Some((onmessage, onerror));

        let (promise, resolve, reject) = new_promise();
        *self.init_waiter.borrow_mut() = Some((resolve, reject));

        let json = serde_json::to_string(&WorkerRequest::Init)
            .map_err(|e| DispatchError::Encode(e.to_string()))?;
        worker
            .post_message(&JsValue::from_str(&json))
            .map_err(|e| DispatchError::Post(js_message(&e)))?;

        *self.inner.borrow_mut() = Some(worker);
        *self.init.borrow_mut() = InitState::InFlight(promise.clone());
        Ok(promise)
    }

    fn post(&self, json: &str) -> Result<(), DispatchError> {
        let inner = self.inner.borrow();
        let worker = inner
            .as_ref()
            .ok_or_else(|| DispatchError::Post("worker context not initialized".into()))?;
        worker
            .post_message(&JsValue::from_str(json))
            .map_err(|e| DispatchError::Post(js_message(&e)))
    }
}

/// Dispatch one worker frame to the init waiter or the pending table.
fn route_response(
    event: &web_sys::MessageEvent,
    pending: &Rc<RefCell<HashMap<u64, PendingRequest>>>,
    progress: &Rc<RefCell<HashMap<u64, ProgressFn>>>,
    epoch: &Cell<u64>,
    init_waiter: &Rc<RefCell<Option<(js_sys::Function, js_sys::Function)>>>,
    ready_fast: &Rc<Cell<bool>>,
) {
    let Some(json) = event.data().as_string() else {
        web_sys::console::warn_1(&JsValue::from_str("halfway: non-string worker frame dropped"));
        return;
    };
    let response: WorkerResponse = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(e) => {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "halfway: undecodable worker frame dropped: {e}",
            )));
            return;
        }
    };

    match response {
        WorkerResponse::Ready { used_fast_kernel } => {
            ready_fast.set(used_fast_kernel);
            if let Some((resolve, _)) = init_waiter.borrow_mut().take() {
                resolve.call0(&JsValue::NULL).ok();
            }
        }
        WorkerResponse::Progress { id, percent } => {
            deliver_progress(progress, epoch, id, percent);
        }
        WorkerResponse::Result { id, data } => {
            progress.borrow_mut().remove(&id);
            let Some(entry) = pending.borrow_mut().remove(&id) else {
                warn_stale(id);
                return;
            };
            *entry.result.borrow_mut() = Some(data);
            entry.resolve.call0(&JsValue::NULL).ok();
        }
        WorkerResponse::Error { id, message } => {
            progress.borrow_mut().remove(&id);
            let Some(entry) = pending.borrow_mut().remove(&id) else {
                warn_stale(id);
                return;
            };
            entry
                .reject
                .call1(&JsValue::NULL, &JsValue::from_str(&message))
                .ok();
        }
    }
}

/// Invoke one progress callback with no table borrow held. The
/// callback is user code and may reenter the dispatcher (a cancel
/// button calling [`SearchWorker::terminate`], say); an outstanding
/// `RefCell` borrow here would turn that into a runtime panic. The
/// callback is only handed back while its session is still alive.
fn deliver_progress(
    progress: &RefCell<HashMap<u64, ProgressFn>>,
    epoch: &Cell<u64>,
    id: u64,
    percent: u8,
) {
    let Some(mut callback) = progress.borrow_mut().remove(&id) else {
        return;
    };
    let session = epoch.get();
    callback(percent.min(100));
    if epoch.get() == session {
        progress.borrow_mut().insert(id, callback);
    }
}

fn warn_stale(id: u64) {
    web_sys::console::warn_1(&JsValue::from_str(&format!(
        "halfway: frame for unknown request id {id} dropped",
    )));
}

/// Generate the coverage heatmap for two point sets, reusing the
/// dispatcher's offload decision for the full midpoint enumeration.
///
/// A truncated (capped) heatmap is a valid partial result; the
/// truncation is logged to the console, not raised.
///
/// # Errors
///
/// Returns a [`DispatchError`] if the midpoint enumeration fails.
#[allow(clippy::future_not_send)]
pub async fn coverage_heatmap(
    worker: &SearchWorker,
    points_a: &[LatLng],
    points_b: &[LatLng],
    config: &HeatmapConfig,
    on_progress: Option<ProgressFn>,
) -> Result<Heatmap, DispatchError> {
    let outcome = worker
        .calculate_all_midpoints(points_a, points_b, on_progress)
        .await?;
    let map = heatmap::generate(&outcome.midpoints, config);
    if map.truncated {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "halfway: heatmap capped at {} cells; rendering a partial map",
            config.max_cells,
        )));
    }
    Ok(map)
}

/// Extract a human-readable message from a JS error value.
fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| "unknown worker error".into())
}

/// Create a web worker from embedded JS glue and WASM binary.
///
/// 1. Creates a Blob URL for the WASM binary
/// 2. Wraps the JS glue in a self-initializing script that loads the
///    WASM from the Blob URL
/// 3. Creates a Blob URL for the wrapper script
/// 4. Creates a Worker from the wrapper Blob URL
fn create_worker(worker_js: &str, worker_wasm: &[u8]) -> web_sys::Worker {
    // Create a Blob URL for the WASM binary.
    let wasm_array = js_sys::Uint8Array::from(worker_wasm);
    let wasm_blob_parts = js_sys::Array::new();
    wasm_blob_parts.push(&wasm_array.buffer());
    let wasm_blob_opts = web_sys::BlobPropertyBag::new();
    wasm_blob_opts.set_type("application/wasm");
    let wasm_blob = web_sys::Blob::new_with_buffer_source_sequence_and_options(
        &wasm_blob_parts,
        &wasm_blob_opts,
    )
    .expect_throw("failed to create WASM Blob");
    let wasm_url = web_sys::Url::create_object_url_with_blob(&wasm_blob)
        .expect_throw("failed to create WASM Blob URL");

    // Wrapper script: define the wasm_bindgen glue, then initialize
    // the module from the embedded blob URL.
    let wrapper_js = format!(
        r#"// Worker wrapper — loads embedded wasm_bindgen glue and WASM blob.
{worker_js}

wasm_bindgen("{wasm_url}")
    .catch(function(e) {{ console.error("Worker WASM init failed:", e); }});
"#
    );

    let js_blob_parts = js_sys::Array::new();
    js_blob_parts.push(&JsValue::from_str(&wrapper_js));
    let js_blob_opts = web_sys::BlobPropertyBag::new();
    js_blob_opts.set_type("application/javascript");
    let js_blob =
        web_sys::Blob::new_with_str_sequence_and_options(&js_blob_parts, &js_blob_opts)
            .expect_throw("failed to create JS Blob");
    let js_url = web_sys::Url::create_object_url_with_blob(&js_blob)
        .expect_throw("failed to create JS Blob URL");

    let worker = web_sys::Worker::new(&js_url).expect_throw("failed to create Worker");

    // Revoke the JS URL (already fetched); the WASM URL stays alive
    // for the worker's async init and is leaked — it is only a small
    // blob: reference.
    web_sys::Url::revoke_object_url(&js_url).ok();

    worker
}

/// Create a JS Promise along with its resolve and reject functions.
fn new_promise() -> (js_sys::Promise, js_sys::Function, js_sys::Function) {
    let resolve = Rc::new(RefCell::new(None::<js_sys::Function>));
    let reject = Rc::new(RefCell::new(None::<js_sys::Function>));
    let resolve_clone = Rc::clone(&resolve);
    let reject_clone = Rc::clone(&reject);

    let promise = js_sys::Promise::new(&mut move |res, rej| {
        *resolve_clone.borrow_mut() = Some(res);
        *reject_clone.borrow_mut() = Some(rej);
    });

    let resolve_fn = resolve
        .borrow_mut()
        .take()
        .expect_throw("resolve not captured");
    let reject_fn = reject
        .borrow_mut()
        .take()
        .expect_throw("reject not captured");

    (promise, resolve_fn, reject_fn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary() {
        assert!(!should_offload(99, 101)); // 9999
        assert!(should_offload(100, 100)); // 10000
        assert!(should_offload(100, 101));
        assert!(!should_offload(0, 1_000_000));
        assert!(!should_offload(1, 9999));
        assert!(should_offload(1, 10_000));
    }

    #[test]
    fn threshold_does_not_overflow() {
        assert!(should_offload(usize::MAX, usize::MAX));
    }

    #[test]
    fn auto_route_follows_threshold() {
        assert!(SearchWorker::runs_inline(10, 10, Route::Auto));
        assert!(!SearchWorker::runs_inline(100, 100, Route::Auto));
        assert!(SearchWorker::runs_inline(100, 100, Route::Inline));
        assert!(!SearchWorker::runs_inline(1, 1, Route::Delegated));
    }

    #[test]
    fn progress_callback_may_reenter_the_tables() {
        // The callback tears the session down mid-delivery, the way a
        // cancel button calling terminate would: the table must not be
        // borrowed while user code runs, and the abandoned request
        // must not come back.
        let progress: Rc<RefCell<HashMap<u64, ProgressFn>>> =
            Rc::new(RefCell::new(HashMap::new()));
        let epoch = Rc::new(Cell::new(0_u64));
        let seen = Rc::new(Cell::new(0_u8));

        let table = Rc::clone(&progress);
        let bump = Rc::clone(&epoch);
        let sink = Rc::clone(&seen);
        progress.borrow_mut().insert(
            7,
            Box::new(move |p| {
                sink.set(p);
                table.borrow_mut().clear();
                bump.set(bump.get() + 1);
            }),
        );

        deliver_progress(&progress, &epoch, 7, 42);
        assert_eq!(seen.get(), 42);
        assert!(progress.borrow().is_empty());
    }

    #[test]
    fn progress_callback_survives_for_later_frames() {
        let progress: RefCell<HashMap<u64, ProgressFn>> = RefCell::new(HashMap::new());
        let epoch = Cell::new(0_u64);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        progress
            .borrow_mut()
            .insert(3, Box::new(move |p| sink.borrow_mut().push(p)));

        deliver_progress(&progress, &epoch, 3, 10);
        // An out-of-contract percent is clamped on delivery.
        deliver_progress(&progress, &epoch, 3, 200);
        // Frames for unknown ids are dropped without effect.
        deliver_progress(&progress, &epoch, 99, 50);
        assert_eq!(*seen.borrow(), vec![10, 100]);
        assert_eq!(progress.borrow().len(), 1);
    }
}
