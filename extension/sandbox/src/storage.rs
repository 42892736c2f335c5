//! Browser storage and clock, plus board-slot reads that report to the console.

use mirror::clock::Clock;
use mirror::protocol::{DecodedState, StateBlob};
use mirror::{BlobAccessor, BlobStore, StoreError};
use web_sys::Storage;

use crate::{stringify_js_error, window};

/// The page's `localStorage`, already partitioned per sandbox by the host.
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn new() -> Result<Self, wasm_bindgen::JsValue> {
        let storage = window()?
            .local_storage()?
            .ok_or_else(|| wasm_bindgen::JsValue::from_str("localStorage is disabled"))?;
        Ok(Self { storage })
    }
}

impl BlobStore for LocalStorageStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage
            .get_item(key)
            .map_err(|err| StoreError::Unavailable(stringify_js_error(&err)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| StoreError::Unavailable(stringify_js_error(&err)))
    }
}

/// `performance.now()`, or `Date.now()` where the Performance API is missing.
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        let performance = web_sys::window().and_then(|w| w.performance());
        Self { performance }
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        match &self.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now(),
        }
    }
}

// `tracing` has no subscriber in a sandbox, so failures the accessor would
// only log are passed to `warn` instead.

/// Current board blob; storage failures are reported and read as absent.
pub fn read_board<S: BlobStore>(accessor: &BlobAccessor<S>, warn: impl Fn(&str)) -> Option<StateBlob> {
    match accessor.store().get_item(accessor.key()) {
        Ok(raw) => StateBlob::from_raw(raw),
        Err(err) => {
            warn(&format!("unable to read {}: {err}", accessor.key()));
            None
        }
    }
}

/// Decoded board. Storage and decode failures are reported and read as
/// absent; a value that needed recovery is reported but still returned.
pub fn decode_board<S: BlobStore>(accessor: &BlobAccessor<S>, warn: impl Fn(&str)) -> Option<DecodedState> {
    match accessor.decode_current() {
        Ok(Some(decoded)) => {
            if decoded.is_recovered() {
                warn(&format!("{} needed recovery to decode", accessor.key()));
            }
            Some(decoded)
        }
        Ok(None) => None,
        Err(err) => {
            warn(&format!("failed to decode {}: {err}", accessor.key()));
            None
        }
    }
}
