//! Page-world half: answers relay commands through the live render graph.

use std::cell::RefCell;

use js_sys::{Object, Reflect};
use mirror::protocol::{BridgeCommand, BridgeEnvelope, BridgeEvent, InstanceStatus};
use mirror::{BlobAccessor, EventSink, PageBridge};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::MessageEvent;

use crate::graph::DomGraph;
use crate::storage::{LocalStorageStore, PerformanceClock};
use crate::{log, to_js, window};

/// Set on `window` once a bridge is listening, so a second injection is a no-op.
const INSTALL_GUARD: &str = "__BOARD_MIRROR_BRIDGE__";

type DomBridge = PageBridge<DomGraph, LocalStorageStore, PerformanceClock, WindowSink>;

thread_local! {
    static BRIDGE: RefCell<Option<DomBridge>> = const { RefCell::new(None) };
}

/// Posts bridge events back onto the page's window.
pub struct WindowSink {
    window: web_sys::Window,
}

impl EventSink for WindowSink {
    fn emit(&self, event: BridgeEvent) {
        match &event {
            BridgeEvent::InstanceStatus(InstanceStatus::Captured { duration_ms, .. }) => {
                log::info(log::PAGE, &format!("controller captured in {duration_ms}ms"))
            }
            BridgeEvent::InstanceStatus(InstanceStatus::Missing { nodes_checked, .. }) => {
                log::info(log::PAGE, &format!("controller not found after {nodes_checked} elements"))
            }
            BridgeEvent::ApplyResult(result) if result.ok => log::info(log::PAGE, "blob applied"),
            BridgeEvent::ApplyResult(result) => log::warn(
                log::PAGE,
                &format!(
                    "apply failed: {:?} {}",
                    result.reason,
                    result.message.as_deref().unwrap_or("")
                ),
            ),
        }

        let posted = to_js(&BridgeEnvelope::new(event)).and_then(|message| self.window.post_message(&message, "*"));
        if let Err(err) = posted {
            log::warn(log::PAGE, &format!("failed to post event: {}", crate::stringify_js_error(&err)));
        }
    }
}

/// Installs the page bridge once per page. Returns `false` if one is already
/// installed.
#[wasm_bindgen]
pub fn install_page_bridge() -> Result<bool, JsValue> {
    let window = window()?;
    let guard = JsValue::from_str(INSTALL_GUARD);
    if Reflect::get(&window, &guard)?.is_truthy() {
        return Ok(false);
    }

    let bridge = PageBridge::new(
        DomGraph::new(window.clone())?,
        BlobAccessor::new(LocalStorageStore::new()?),
        PerformanceClock::new(),
        WindowSink {
            window: window.clone(),
        },
    );
    BRIDGE.with(|slot| *slot.borrow_mut() = Some(bridge));
    Reflect::set(&window, &guard, &JsValue::TRUE)?;

    {
        let own_window = window.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let from_self = event
                .source()
                .is_some_and(|source| Object::is(&source, &own_window));
            if !from_self {
                return;
            }
            let Some(command) = parse_command(&event.data()) else {
                return;
            };
            with_bridge(|bridge| bridge.handle(command));
        });
        window.add_event_listener_with_callback("message", onmessage.as_ref().unchecked_ref())?;
        onmessage.forget();
    }

    // First search once the current task has finished rendering.
    {
        let initial = Closure::<dyn FnMut()>::new(|| {
            with_bridge(|bridge| {
                bridge.find_instance();
            });
        });
        window.set_timeout_with_callback_and_timeout_and_arguments_0(initial.as_ref().unchecked_ref(), 0)?;
        initial.forget();
    }

    log::info(log::PAGE, "installed");
    Ok(true)
}

fn parse_command(data: &JsValue) -> Option<BridgeCommand> {
    let value: serde_json::Value = serde_wasm_bindgen::from_value(data.clone()).ok()?;
    BridgeEnvelope::parse(value)
}

fn with_bridge(f: impl FnOnce(&mut DomBridge)) {
    BRIDGE.with(|slot| {
        if let Some(bridge) = slot.borrow_mut().as_mut() {
            f(bridge);
        }
    });
}
