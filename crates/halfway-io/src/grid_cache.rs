//! Session cache over the precomputed pair index files.
//!
//! Cell files are fetched lazily over HTTP (one JSON file per nonempty
//! cell, written by `halfway-precompute`) and cached for the session,
//! keyed by dataset + cell. A missing file (HTTP 404) is a valid
//! "no pairs here" answer; any other fetch or decode failure
//! propagates as a [`GridError`].
//!
//! The cache is read-only with respect to the index: switching
//! datasets or mutating the underlying point set invalidates it via
//! [`GridCache::clear`] — invalidation is the caller's responsibility
//! to trigger, never automatic.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use halfway_geo::grid::{self, CellKey, GridConfig, GridError, PairRecord, RADIUS_LADDER_KM};
use halfway_geo::types::{Combination, LatLng};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Lazily fetched, session-cached view of one precomputed dataset.
pub struct GridCache {
    /// URL prefix the index files are served under.
    base_url: String,
    dataset: RefCell<String>,
    config: GridConfig,
    /// Loaded cells; `None` records a confirmed-absent cell so a 404
    /// is not re-fetched on the next widening pass.
    cells: RefCell<HashMap<CellKey, Option<Rc<Vec<PairRecord>>>>>,
}

impl GridCache {
    /// Create a cache for `dataset` served under `base_url`
    /// (e.g. `"/pairs"` with files at `/pairs/<dataset>/cells/<key>.json`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, dataset: impl Into<String>, config: GridConfig) -> Self {
        Self {
            base_url: base_url.into(),
            dataset: RefCell::new(dataset.into()),
            config,
            cells: RefCell::new(HashMap::new()),
        }
    }

    /// Switch to a different precomputed dataset, dropping every
    /// cached cell if it actually changed.
    pub fn set_dataset(&self, dataset: &str) {
        if *self.dataset.borrow() != dataset {
            dataset.clone_into(&mut self.dataset.borrow_mut());
            self.clear();
        }
    }

    /// Drop all cached cells. Call when the underlying point set (or
    /// its index files) change.
    pub fn clear(&self) {
        self.cells.borrow_mut().clear();
    }

    /// Number of cells currently cached (including confirmed-absent).
    #[must_use]
    pub fn cached_cells(&self) -> usize {
        self.cells.borrow().len()
    }

    fn cell_url(&self, key: CellKey) -> String {
        format!("{}/{}/cells/{key}.json", self.base_url, self.dataset.borrow())
    }

    /// Query the dataset for the `budget` pairs whose midpoints lie
    /// closest to `target`, widening through [`RADIUS_LADDER_KM`] and
    /// fetching each cell at most once per session.
    ///
    /// An empty result means the dataset has no pairs near the target
    /// (a valid answer); errors are real fetch/decode failures.
    ///
    /// # Errors
    ///
    /// Propagates the first [`GridError`] from the network or decoder.
    #[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
    pub async fn query_nearest(
        &self,
        target: LatLng,
        budget: usize,
    ) -> Result<Vec<Combination>, GridError> {
        if budget == 0 {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<CellKey> = HashSet::new();
        let mut candidates: Vec<PairRecord> = Vec::new();

        for radius_km in RADIUS_LADDER_KM {
            for key in grid::cells_within_radius(target, radius_km, &self.config) {
                if visited.insert(key)
                    && let Some(records) = self.load_cell(key).await?
                {
                    candidates.extend(records.iter().copied());
                }
            }
            if candidates.len() >= budget {
                break;
            }
        }

        Ok(grid::rank_candidates(&candidates, target, budget))
    }

    /// Fetch one cell file, consulting the session cache first.
    #[allow(clippy::future_not_send)]
    async fn load_cell(&self, key: CellKey) -> Result<Option<Rc<Vec<PairRecord>>>, GridError> {
        if let Some(cached) = self.cells.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let loaded = fetch_cell_file(&self.cell_url(key), key).await?;
        let loaded = loaded.map(Rc::new);
        self.cells.borrow_mut().insert(key, loaded.clone());
        Ok(loaded)
    }
}

/// Fetch and decode one cell file. `Ok(None)` for HTTP 404.
#[allow(clippy::future_not_send)]
async fn fetch_cell_file(url: &str, key: CellKey) -> Result<Option<Vec<PairRecord>>, GridError> {
    let load_err = |message: String| GridError::Load {
        key: key.to_string(),
        message,
    };

    let window = web_sys::window().ok_or_else(|| load_err("no window".into()))?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| load_err(js_message(&e)))?
        .dyn_into()
        .map_err(|_| load_err("fetch returned a non-Response".into()))?;

    if response.status() == 404 {
        return Ok(None);
    }
    if !response.ok() {
        return Err(load_err(format!("HTTP {}", response.status())));
    }

    let text = JsFuture::from(response.text().map_err(|e| load_err(js_message(&e)))?)
        .await
        .map_err(|e| load_err(js_message(&e)))?
        .as_string()
        .ok_or_else(|| load_err("response body is not text".into()))?;

    let records: Vec<PairRecord> =
        serde_json::from_str(&text).map_err(|e| GridError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    Ok(Some(records))
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| "unknown fetch error".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_url_shape() {
        let cache = GridCache::new("/pairs", "cities", GridConfig::default());
        let key = CellKey {
            lat_bucket: 28,
            lng_bucket: 38,
        };
        assert_eq!(cache.cell_url(key), "/pairs/cities/cells/28_38.json");
    }

    #[test]
    fn switching_dataset_clears_cache() {
        let cache = GridCache::new("/pairs", "cities", GridConfig::default());
        cache.cells.borrow_mut().insert(
            CellKey {
                lat_bucket: 0,
                lng_bucket: 0,
            },
            None,
        );
        assert_eq!(cache.cached_cells(), 1);

        // Same dataset: cache survives.
        cache.set_dataset("cities");
        assert_eq!(cache.cached_cells(), 1);

        // Different dataset: cache dropped.
        cache.set_dataset("capitals");
        assert_eq!(cache.cached_cells(), 0);
    }
}
