//! The live DOM as a [`RenderGraph`].

use std::cell::Cell;

use js_sys::{Function, Object, Reflect, WeakMap};
use mirror::locator::Edge;
use mirror::protocol::RESTORE_ENTRY_POINT;
use mirror::{RenderGraph, RestoreCapability};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element};

use crate::stringify_js_error;

/// Page-global slot holding the captured controller, for devtools.
pub const INSTANCE_SLOT: &str = "__BOARD_MIRROR_INSTANCE__";

pub struct DomGraph {
    document: Document,
    window: web_sys::Window,
    ids: WeakMap,
    next_id: Cell<u64>,
}

impl DomGraph {
    pub fn new(window: web_sys::Window) -> Result<Self, JsValue> {
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self {
            document,
            window,
            ids: WeakMap::new(),
            next_id: Cell::new(0),
        })
    }
}

/// Instance fields pointing back at the component's fiber, newest React first.
const FIBER_BACKLINKS: [&str; 2] = ["_reactInternals", "_reactInternalFiber"];

/// Whether a class instance is still mounted. React clears `return` on the
/// fibers of an unmounted subtree; the instance's own backlink is preferred
/// over `found_on`, which may be a stale alternate.
fn mounted<V>(instance: &V, found_on: &V, field: impl Fn(&V, &str) -> Option<V>) -> bool {
    let fiber = FIBER_BACKLINKS.iter().find_map(|key| field(instance, key));
    field(fiber.as_ref().unwrap_or(found_on), "return").is_some()
}

/// A mounted controller object with a callable restore method.
#[derive(Clone)]
pub struct JsCapability {
    instance: Object,
    fiber: JsValue,
}

impl JsCapability {
    fn method(&self) -> Option<Function> {
        Reflect::get(&self.instance, &JsValue::from_str(RESTORE_ENTRY_POINT))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }
}

impl RestoreCapability for JsCapability {
    fn is_live(&self) -> bool {
        let instance: &JsValue = &self.instance;
        self.method().is_some() && mounted(instance, &self.fiber, object_at)
    }

    fn restore(&self) -> Result<(), String> {
        let method = self
            .method()
            .ok_or_else(|| format!("{RESTORE_ENTRY_POINT} is no longer callable"))?;
        method
            .call0(&self.instance)
            .map(|_| ())
            .map_err(|err| stringify_js_error(&err))
    }
}

fn object_at(target: &JsValue, key: &str) -> Option<JsValue> {
    let value = Reflect::get(target, &JsValue::from_str(key)).ok()?;
    value.is_object().then_some(value)
}

impl RenderGraph for DomGraph {
    type Host = Element;
    type Node = JsValue;
    type Capability = JsCapability;

    fn hosts(&self) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all("*") else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn property_keys(&self, host: &Element) -> Vec<String> {
        Object::keys(host.unchecked_ref::<Object>())
            .iter()
            .filter_map(|key| key.as_string())
            .collect()
    }

    fn property(&self, host: &Element, key: &str) -> Option<JsValue> {
        object_at(host, key)
    }

    fn identity(&self, node: &JsValue) -> u64 {
        let Some(object) = node.dyn_ref::<Object>() else {
            return u64::MAX;
        };
        if let Some(id) = self.ids.get(object).as_f64() {
            return id as u64;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.ids.set(object, &JsValue::from_f64(id as f64));
        id
    }

    fn edge(&self, node: &JsValue, edge: Edge) -> Option<JsValue> {
        object_at(node, edge.field())
    }

    fn capability(&self, node: &JsValue) -> Option<JsCapability> {
        let instance = object_at(node, "stateNode")?.unchecked_into::<Object>();
        let capability = JsCapability {
            instance,
            fiber: node.clone(),
        };
        capability.is_live().then_some(capability)
    }

    fn on_captured(&self, capability: &JsCapability) {
        let _ = Reflect::set(&self.window, &JsValue::from_str(INSTANCE_SLOT), &capability.instance);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Objects as ids, properties as `(object, key) -> object`.
    struct Heap(HashMap<(u32, &'static str), u32>);

    impl Heap {
        fn new(links: &[(u32, &'static str, u32)]) -> Self {
            Self(links.iter().map(|&(from, key, to)| ((from, key), to)).collect())
        }

        fn field(&self) -> impl Fn(&u32, &str) -> Option<u32> + '_ {
            move |object: &u32, key: &str| {
                self.0
                    .iter()
                    .find(|((from, name), _)| from == object && *name == key)
                    .map(|(_, to)| *to)
            }
        }
    }

    const INSTANCE: u32 = 1;
    const FIBER: u32 = 2;
    const ALTERNATE: u32 = 3;
    const PARENT: u32 = 4;

    #[test]
    fn attached_instance_is_mounted() {
        let heap = Heap::new(&[(INSTANCE, "_reactInternals", FIBER), (FIBER, "return", PARENT)]);
        assert!(mounted(&INSTANCE, &FIBER, heap.field()));
    }

    #[test]
    fn detached_fiber_is_not_mounted() {
        // Unmount clears `return` but leaves the restore method on the instance.
        let heap = Heap::new(&[(INSTANCE, "_reactInternals", FIBER)]);
        assert!(!mounted(&INSTANCE, &FIBER, heap.field()));
    }

    #[test]
    fn backlink_wins_over_the_fiber_it_was_found_on() {
        let heap = Heap::new(&[(INSTANCE, "_reactInternals", FIBER), (ALTERNATE, "return", PARENT)]);
        assert!(!mounted(&INSTANCE, &ALTERNATE, heap.field()));
    }

    #[test]
    fn legacy_backlink_and_missing_backlink() {
        let legacy = Heap::new(&[(INSTANCE, "_reactInternalFiber", FIBER), (FIBER, "return", PARENT)]);
        assert!(mounted(&INSTANCE, &ALTERNATE, legacy.field()));

        let bare = Heap::new(&[(FIBER, "return", PARENT)]);
        assert!(mounted(&INSTANCE, &FIBER, bare.field()));
        assert!(!mounted(&INSTANCE, &ALTERNATE, bare.field()));
    }
}
