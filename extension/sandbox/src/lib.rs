//! Browser side of board-mirror.
//!
//! The same module is loaded twice per sandbox: [`install_page_bridge`] runs
//! in the page's own world, where the render graph is reachable, and
//! [`start_sandbox_relay`] runs in the isolated world that holds the
//! coordinator socket. The two only talk through `window.postMessage`.
//!
//! [`start_sandbox_relay`] returns a [`SandboxRelay`] handle the embedding script
//! can use to read, publish or inject a board by hand.

mod graph;
mod log;
mod page;
mod relay;
mod storage;

use mirror::sandbox::presets;
use mirror::BlobAccessor;
use wasm_bindgen::prelude::*;

pub use page::install_page_bridge;
pub use relay::{start_sandbox_relay, SandboxRelay};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// The sandbox windows a host should open, as plain JS objects.
#[wasm_bindgen]
pub fn sandbox_presets() -> Result<JsValue, JsValue> {
    to_js(&presets())
}

/// Decodes the board currently saved in this sandbox's `localStorage`.
///
/// Returns `undefined` when nothing usable is stored.
#[wasm_bindgen]
pub fn decode_saved_state() -> Result<JsValue, JsValue> {
    let accessor = BlobAccessor::new(storage::LocalStorageStore::new()?);
    match storage::decode_board(&accessor, |msg| log::warn(log::RELAY, msg)) {
        Some(decoded) => to_js(decoded.value()),
        None => Ok(JsValue::UNDEFINED),
    }
}

pub(crate) fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

pub(crate) fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window in this context"))
}

pub(crate) fn stringify_js_error(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(err).ok()?.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}
